use kernel_fs::disk::SynchDisk;
use kernel_fs::filehdr::FileHeaderError;
use kernel_fs::filesys::{FileSystem, FileSystemError};
use kernel_info::filesys::DIRECT_CAPACITY;
use kernel_info::machine::{NUM_SECTORS, SECTOR_SIZE};

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| u8::try_from(i % 251).unwrap()).collect()
}

#[test]
fn unaligned_writes_read_back() {
    let fs = FileSystem::format(SynchDisk::new(NUM_SECTORS)).unwrap();
    let sector = fs.create(4 * SECTOR_SIZE).unwrap();
    let file = fs.open(sector, true).unwrap();

    let data = pattern(2 * SECTOR_SIZE + 17);
    assert_eq!(file.write_at(&data, 50).unwrap(), data.len());

    let mut back = vec![0u8; data.len()];
    assert_eq!(file.read_at(&mut back, 50).unwrap(), data.len());
    assert_eq!(back, data);

    // Bytes around the write keep their previous (zero) contents.
    let mut edge = [0xFFu8; 50];
    file.read_at(&mut edge, 0).unwrap();
    assert!(edge.iter().all(|&b| b == 0));
}

#[test]
fn writes_past_end_grow_the_file() {
    let fs = FileSystem::format(SynchDisk::new(NUM_SECTORS)).unwrap();
    let sector = fs.create(0).unwrap();
    let free = fs.free_sectors();

    let mut file = fs.open(sector, true).unwrap();
    let data = pattern((DIRECT_CAPACITY + 3) * SECTOR_SIZE);
    file.write(&data).unwrap();
    assert_eq!(file.position(), data.len());
    assert_eq!(file.length().unwrap(), data.len());
    assert_eq!(free - fs.free_sectors(), DIRECT_CAPACITY + 3 + 1);

    file.seek(0);
    let mut back = vec![0u8; data.len() + 10];
    assert_eq!(file.read(&mut back).unwrap(), data.len());
    assert_eq!(&back[..data.len()], &data[..]);
}

#[test]
fn reads_stop_at_end_of_file() {
    let fs = FileSystem::format(SynchDisk::new(256)).unwrap();
    let sector = fs.create(10).unwrap();
    let file = fs.open(sector, false).unwrap();

    let mut buf = [0u8; 32];
    assert_eq!(file.read_at(&mut buf, 4).unwrap(), 6);
    assert_eq!(file.read_at(&mut buf, 10).unwrap(), 0);
}

#[test]
fn open_and_close_are_counted() {
    let fs = FileSystem::format(SynchDisk::new(256)).unwrap();
    let sector = fs.create(10).unwrap();

    let reader = fs.open(sector, false).unwrap();
    let writer = fs.open(sector, true).unwrap();
    let header = fs.header(sector).unwrap();
    assert_eq!((header.open_count(), header.write_count()), (2, 1));

    writer.close().unwrap();
    drop(reader);
    let header = fs.header(sector).unwrap();
    assert_eq!((header.open_count(), header.write_count()), (0, 0));
}

#[test]
fn timestamps_advance_with_disk_time() {
    let fs = FileSystem::format(SynchDisk::new(256)).unwrap();
    let sector = fs.create(10).unwrap();
    let created = fs.header(sector).unwrap().create_time();

    let file = fs.open(sector, true).unwrap();
    file.write_at(b"abc", 0).unwrap();
    let header = fs.header(sector).unwrap();
    assert!(header.last_modify_time() > created);
    assert_eq!(header.create_time(), created);
    assert!(header.last_access_time() >= header.last_modify_time());
}

#[test]
fn remove_returns_every_sector() {
    let fs = FileSystem::format(SynchDisk::new(NUM_SECTORS)).unwrap();
    let free = fs.free_sectors();
    let sector = fs.create(300 * SECTOR_SIZE).unwrap();
    assert!(fs.free_sectors() < free);

    fs.remove(sector).unwrap();
    assert_eq!(fs.free_sectors(), free);
    assert!(!fs.is_sector_used(sector));
}

#[test]
fn removing_twice_is_fatal() {
    let fs = FileSystem::format(SynchDisk::new(256)).unwrap();
    let sector = fs.create(3 * SECTOR_SIZE).unwrap();
    fs.remove(sector).unwrap();
    let free = fs.free_sectors();

    let err = fs.remove(sector).unwrap_err();
    assert!(matches!(
        err,
        FileSystemError::Header(FileHeaderError::Corrupted(_))
    ));
    assert!(err.is_fatal());
    assert_eq!(fs.free_sectors(), free);
}

#[test]
fn mount_restores_free_map_and_contents() {
    let fs = FileSystem::format(SynchDisk::new(NUM_SECTORS)).unwrap();
    let sector = fs.create(0).unwrap();
    fs.write_at(sector, b"persistent", 0).unwrap();
    let free = fs.free_sectors();

    let fs = FileSystem::mount(fs.into_disk()).unwrap();
    assert_eq!(fs.free_sectors(), free);
    assert!(fs.is_sector_used(sector));

    let mut buf = [0u8; 10];
    fs.read_at(sector, &mut buf, 0).unwrap();
    assert_eq!(&buf, b"persistent");
}

#[test]
fn header_dump_lists_blocks() {
    let fs = FileSystem::format(SynchDisk::new(256)).unwrap();
    let sector = fs.create(0).unwrap();
    fs.write_at(sector, b"dump me", 0).unwrap();
    let text = fs.header(sector).unwrap().render(fs.disk()).unwrap();
    assert!(text.contains("File size: 7."));
    assert!(text.contains("dump me"));
}

#[test]
fn growth_and_removal_release_the_free_map() {
    let fs = FileSystem::format(SynchDisk::new(NUM_SECTORS)).unwrap();
    let sector = fs.create(3 * SECTOR_SIZE).unwrap();
    assert_eq!(fs.write_at(sector, &[7; 40], 3 * SECTOR_SIZE).unwrap(), 40);
    fs.remove(sector).unwrap();
    assert!(fs.remove(sector).is_err());

    // A second thread can take the lock right away.
    std::thread::scope(|s| {
        s.spawn(|| assert!(fs.create(SECTOR_SIZE).is_ok()));
    });
    assert!(fs.flush_free_map().is_ok());
}
