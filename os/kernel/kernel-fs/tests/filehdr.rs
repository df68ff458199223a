use kernel_alloc::bitmap::{Bitmap, BitmapError};
use kernel_fs::disk::SynchDisk;
use kernel_fs::filehdr::{FileHeader, FileHeaderError, index_overhead};
use kernel_fs::index_table::IndexTable;
use kernel_info::filesys::{
    DIRECT_CAPACITY, INDIRECT_CAPACITY, MAX_FILE_SECTORS, MAX_FILE_SIZE, SECTORS_IN_SECTOR,
};
use kernel_info::machine::SECTOR_SIZE;
use kernel_memory_addresses::SectorNumber;
use std::collections::HashSet;

const DISK_SECTORS: usize = 1200;

fn fresh(sectors: usize) -> (SynchDisk, Bitmap) {
    let mut map = Bitmap::new(sectors);
    map.mark(0).unwrap();
    (SynchDisk::new(sectors), map)
}

fn interesting_sizes() -> Vec<usize> {
    vec![
        0,
        1,
        SECTOR_SIZE,
        DIRECT_CAPACITY * SECTOR_SIZE,
        DIRECT_CAPACITY * SECTOR_SIZE + 1,
        INDIRECT_CAPACITY * SECTOR_SIZE,
        INDIRECT_CAPACITY * SECTOR_SIZE + 1,
        (INDIRECT_CAPACITY + SECTORS_IN_SECTOR) * SECTOR_SIZE + 5,
        (INDIRECT_CAPACITY + 3 * SECTORS_IN_SECTOR + 7) * SECTOR_SIZE,
        MAX_FILE_SIZE,
    ]
}

fn data_sectors(disk: &SynchDisk, header: &FileHeader) -> Vec<SectorNumber> {
    (0..header.num_sectors())
        .map(|i| header.logical_sector_to_sector(disk, i).unwrap().unwrap())
        .collect()
}

#[test]
fn allocation_maps_every_logical_sector_to_a_distinct_used_sector() {
    for size in interesting_sizes() {
        let (disk, mut map) = fresh(DISK_SECTORS);
        let before = map.num_clear();

        let mut header = FileHeader::new();
        header.allocate(&disk, &mut map, size).unwrap();

        let expected = size.div_ceil(SECTOR_SIZE);
        assert_eq!(header.num_sectors(), expected, "size {size}");
        assert_eq!(header.file_length(), size);

        let sectors = data_sectors(&disk, &header);
        let distinct: HashSet<_> = sectors.iter().copied().collect();
        assert_eq!(distinct.len(), expected, "size {size}");
        assert!(sectors.iter().all(|s| map.test(s.index())));
        assert!(!distinct.contains(&SectorNumber::new(0)));

        assert_eq!(
            before - map.num_clear(),
            expected + index_overhead(expected),
            "size {size}"
        );
        assert_eq!(header.logical_sector_to_sector(&disk, expected).unwrap(), None);
    }
}

#[test]
fn owned_sectors_cover_exactly_what_was_taken() {
    for size in interesting_sizes() {
        let (disk, mut map) = fresh(DISK_SECTORS);
        let mut header = FileHeader::new();
        header.allocate(&disk, &mut map, size).unwrap();

        let owned: HashSet<usize> = header
            .owned_sectors(&disk)
            .unwrap()
            .iter()
            .map(|s| s.index())
            .collect();
        let used: HashSet<usize> = map.iter_used().filter(|&i| i != 0).collect();
        assert_eq!(owned, used, "size {size}");
    }
}

#[test]
fn deallocate_restores_free_map() {
    for size in interesting_sizes() {
        let (disk, mut map) = fresh(DISK_SECTORS);
        let before = map.clone();

        let mut header = FileHeader::new();
        header.allocate(&disk, &mut map, size).unwrap();
        header.deallocate(&disk, &mut map).unwrap();
        assert_eq!(map, before, "size {size}");
    }
}

#[test]
fn allocate_more_by_zero_changes_nothing() {
    let (disk, mut map) = fresh(DISK_SECTORS);
    let mut header = FileHeader::new();
    header.allocate(&disk, &mut map, 1000).unwrap();
    let (snapshot, free) = (header.clone(), map.num_clear());

    header.allocate_more(&disk, &mut map, 0).unwrap();
    assert_eq!(header, snapshot);
    assert_eq!(map.num_clear(), free);
}

#[test]
fn growth_within_last_sector_takes_nothing() {
    let (disk, mut map) = fresh(DISK_SECTORS);
    let mut header = FileHeader::new();
    header.allocate(&disk, &mut map, 10).unwrap();
    let free = map.num_clear();

    header.allocate_more(&disk, &mut map, SECTOR_SIZE - 10).unwrap();
    assert_eq!(header.file_length(), SECTOR_SIZE);
    assert_eq!(header.num_sectors(), 1);
    assert_eq!(map.num_clear(), free);
}

#[test]
fn direct_file_grows_into_indirect_table() {
    let (disk, mut map) = fresh(DISK_SECTORS);
    let mut header = FileHeader::new();
    header
        .allocate(&disk, &mut map, (DIRECT_CAPACITY - 1) * SECTOR_SIZE)
        .unwrap();
    let before = data_sectors(&disk, &header);
    let free = map.num_clear();

    header.allocate_more(&disk, &mut map, 7 * SECTOR_SIZE).unwrap();
    assert_eq!(header.num_sectors(), DIRECT_CAPACITY + 6);
    assert_eq!(free - map.num_clear(), 7 + 1);

    let owned = header.owned_sectors(&disk).unwrap();
    let table_sector = *owned.last().unwrap();
    let table = IndexTable::read(&disk, table_sector).unwrap();
    assert_eq!(table.filled(), 6);
    assert!(table.is_contiguous());

    let after = data_sectors(&disk, &header);
    assert_eq!(&after[..before.len()], &before[..]);
}

#[test]
fn stepwise_growth_matches_invariants() {
    let (disk, mut map) = fresh(DISK_SECTORS);
    let mut header = FileHeader::new();
    header.allocate(&disk, &mut map, 0).unwrap();

    let mut previous = Vec::new();
    let step = 7 * SECTOR_SIZE - 3;
    while header.file_length() + step <= (INDIRECT_CAPACITY + 3 * SECTORS_IN_SECTOR) * SECTOR_SIZE
    {
        header.allocate_more(&disk, &mut map, step).unwrap();
        let sectors = data_sectors(&disk, &header);
        assert_eq!(&sectors[..previous.len()], &previous[..]);

        let used = map.iter_used().filter(|&i| i != 0).count();
        let n = header.num_sectors();
        assert_eq!(used, n + index_overhead(n));
        previous = sectors;
    }

    header.deallocate(&disk, &mut map).unwrap();
    assert_eq!(map.num_clear(), DISK_SECTORS - 1);
}

#[test]
fn failed_growth_leaves_header_and_map_unchanged() {
    // Room for the direct blocks only.
    let (disk, mut map) = fresh(DIRECT_CAPACITY + 2);
    let mut header = FileHeader::new();
    header
        .allocate(&disk, &mut map, DIRECT_CAPACITY * SECTOR_SIZE)
        .unwrap();
    let (snapshot, map_snapshot) = (header.clone(), map.clone());

    let err = header
        .allocate_more(&disk, &mut map, SECTOR_SIZE)
        .unwrap_err();
    assert_eq!(
        err,
        FileHeaderError::NoSpace {
            needed: 2,
            available: 1
        }
    );
    assert_eq!(header, snapshot);
    assert_eq!(map, map_snapshot);
}

#[test]
fn oversized_growth_rejected() {
    let (disk, mut map) = fresh(DISK_SECTORS);
    let mut header = FileHeader::new();
    header.allocate(&disk, &mut map, MAX_FILE_SIZE).unwrap();
    assert_eq!(header.num_sectors(), MAX_FILE_SECTORS);
    assert_eq!(
        header.allocate_more(&disk, &mut map, 1),
        Err(FileHeaderError::TooLarge {
            sectors: MAX_FILE_SECTORS + 1,
            max: MAX_FILE_SECTORS
        })
    );
}

#[test]
fn second_deallocate_is_detected() {
    let (disk, mut map) = fresh(DISK_SECTORS);
    let mut header = FileHeader::new();
    header
        .allocate(&disk, &mut map, (INDIRECT_CAPACITY + 2) * SECTOR_SIZE)
        .unwrap();
    header.deallocate(&disk, &mut map).unwrap();
    let after_first = map.clone();

    let err = header.deallocate(&disk, &mut map).unwrap_err();
    assert!(matches!(
        err,
        FileHeaderError::Corrupted(BitmapError::AlreadyFree(_))
    ));
    assert!(err.is_fatal());
    assert_eq!(map, after_first);
}

#[test]
fn header_survives_write_back_and_fetch() {
    let (disk, mut map) = fresh(DISK_SECTORS);
    let mut header = FileHeader::new();
    header
        .allocate(&disk, &mut map, (INDIRECT_CAPACITY + 40) * SECTOR_SIZE + 9)
        .unwrap();
    header.set_create_time(42);
    header.open(true);

    let home = SectorNumber::new(u32::try_from(map.find().unwrap()).unwrap());
    header.write_back(&disk, home).unwrap();
    let loaded = FileHeader::fetch_from(&disk, home).unwrap();
    assert_eq!(loaded, header);
    assert_eq!(data_sectors(&disk, &loaded), data_sectors(&disk, &header));
}

#[test]
fn byte_to_sector_uses_sector_granularity() {
    let (disk, mut map) = fresh(DISK_SECTORS);
    let mut header = FileHeader::new();
    header
        .allocate(&disk, &mut map, (INDIRECT_CAPACITY + 1) * SECTOR_SIZE)
        .unwrap();

    let last = INDIRECT_CAPACITY * SECTOR_SIZE;
    assert_eq!(
        header.byte_to_sector(&disk, last + SECTOR_SIZE - 1).unwrap(),
        header
            .logical_sector_to_sector(&disk, INDIRECT_CAPACITY)
            .unwrap()
    );
    assert_eq!(
        header.byte_to_sector(&disk, last + SECTOR_SIZE).unwrap(),
        None
    );
}

#[test]
fn sector_zero_is_an_ordinary_data_sector() {
    let mut map = Bitmap::new(200);
    map.mark(0).unwrap();
    let disk = SynchDisk::new(200);

    let mut header = FileHeader::new();
    header
        .allocate(&disk, &mut map, (DIRECT_CAPACITY + 1) * SECTOR_SIZE)
        .unwrap();
    map.clear(0).unwrap();
    header.allocate_more(&disk, &mut map, SECTOR_SIZE).unwrap();

    let last = header
        .logical_sector_to_sector(&disk, DIRECT_CAPACITY + 1)
        .unwrap();
    assert_eq!(last, Some(SectorNumber::new(0)));
    assert_eq!(data_sectors(&disk, &header).len(), DIRECT_CAPACITY + 2);

    let before = map.num_clear();
    header.deallocate(&disk, &mut map).unwrap();
    assert_eq!(map.num_clear(), before + DIRECT_CAPACITY + 2 + 1);
    assert!(!map.test(0));
}

#[test]
fn growth_reserves_without_disk_io() {
    let (disk, mut map) = fresh(DISK_SECTORS);
    let mut header = FileHeader::new();
    header
        .allocate(&disk, &mut map, DIRECT_CAPACITY * SECTOR_SIZE)
        .unwrap();
    let io = disk.stats();
    let free = map.num_clear();

    let target = (DIRECT_CAPACITY + 3) * SECTOR_SIZE;
    let mut growth = header.reserve_growth(&mut map, target).unwrap();
    assert_eq!(growth.reserved(), 3 + 1);
    assert_eq!(map.num_clear(), free - 4);
    assert_eq!(disk.stats(), io);
    assert_eq!(header.num_sectors(), DIRECT_CAPACITY);

    header.apply_growth(&disk, &mut growth).unwrap();
    assert_eq!(header.num_sectors(), DIRECT_CAPACITY + 3);
    assert_eq!(header.file_length(), target);
    assert_eq!(disk.stats().writes, io.writes + 1);
    assert_eq!(map.num_clear(), free - 4);
    assert_eq!(data_sectors(&disk, &header).len(), DIRECT_CAPACITY + 3);
}

#[test]
fn abandoned_growth_returns_its_sectors() {
    let (disk, mut map) = fresh(DISK_SECTORS);
    let header = FileHeader::new();
    let free = map.num_clear();

    let growth = header
        .reserve_growth(&mut map, (INDIRECT_CAPACITY + 1) * SECTOR_SIZE)
        .unwrap();
    assert_eq!(growth.reserved(), INDIRECT_CAPACITY + 1 + 3);
    growth.abandon(&mut map).unwrap();
    assert_eq!(map.num_clear(), free);
    assert_eq!(disk.stats().writes, 0);
}
