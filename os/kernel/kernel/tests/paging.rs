use kernel::swap::{MemorySwap, SwapStore};
use kernel::{Kernel, KernelError};
use kernel_info::config::{MachineConfig, PageTableKind, TlbPolicyKind};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalFrame, VirtualAddress, VirtualPage};
use kernel_trace::{DebugFlags, DebugLogger};
use kernel_vmem::{AccessSize, ExceptionType, SpaceId, TranslationEntry};
use log::LevelFilter;

fn init_logging() {
    // Several tests race to install the logger; the first one wins.
    let _ = DebugLogger::new(LevelFilter::Warn, DebugFlags::parse("a")).init();
}

fn config(frames: usize, table: PageTableKind, policy: TlbPolicyKind) -> MachineConfig {
    MachineConfig::new()
        .with_num_phys_pages(frames)
        .with_tlb_size(4)
        .with_page_table(table)
        .with_tlb_policy(policy)
}

/// A swap image whose page `n` is filled with the byte `n + 1`.
fn patterned_swap(pages: usize) -> Box<MemorySwap> {
    let page = PAGE_SIZE as usize;
    let mut image = vec![0u8; pages * page];
    for (n, chunk) in image.chunks_exact_mut(page).enumerate() {
        chunk.fill(u8::try_from(n + 1).unwrap());
    }
    Box::new(MemorySwap::from_image(&image))
}

fn page(n: u32) -> VirtualAddress {
    VirtualAddress::new(n * PAGE_SIZE)
}

fn pattern(n: u8) -> u32 {
    u32::from_le_bytes([n + 1; 4])
}

fn resident(kernel: &Kernel, id: SpaceId, vpn: u32) -> Option<TranslationEntry> {
    kernel
        .machine()
        .mmu()
        .mapping()
        .lookup(id, VirtualPage::new(vpn))
        .copied()
}

fn boot(config: MachineConfig, pages: usize) -> (Kernel, SpaceId) {
    init_logging();
    let mut kernel = Kernel::new(config).unwrap();
    let id = kernel.spawn(patterned_swap(pages)).unwrap();
    kernel.switch_to(id).unwrap();
    (kernel, id)
}

#[test]
fn least_recently_used_page_is_evicted_and_written_back() {
    for policy in [TlbPolicyKind::Fifo, TlbPolicyKind::Lru] {
        let (mut kernel, id) = boot(config(3, PageTableKind::Inverted, policy), 6);

        assert_eq!(kernel.read_mem(page(0), AccessSize::Word).unwrap(), pattern(0));
        kernel
            .write_mem(page(1), AccessSize::Word, 0xDEAD_BEEF)
            .unwrap();
        assert_eq!(kernel.read_mem(page(2), AccessSize::Word).unwrap(), pattern(2));
        assert_eq!(kernel.read_mem(page(0), AccessSize::Word).unwrap(), pattern(0));
        assert_eq!(kernel.read_mem(page(3), AccessSize::Word).unwrap(), pattern(3));

        assert!(resident(&kernel, id, 1).is_none(), "{policy:?}");
        for vpn in [0, 2, 3] {
            assert!(resident(&kernel, id, vpn).is_some(), "{policy:?} page {vpn}");
        }
        // Page 3 took over the frame page 1 was evicted from.
        assert_eq!(
            resident(&kernel, id, 3).unwrap().physical_frame,
            PhysicalFrame::new(1)
        );
        assert_eq!(kernel.machine().free_frames(), 0);

        let space = kernel.space(id).unwrap();
        assert_eq!(space.swap().stats().page_writes, 1);
        assert_eq!(space.page_fault_count(), 4);
        assert_eq!(kernel.stats().evictions, 1);
        assert_eq!(kernel.stats().write_backs, 1);

        // The written value survives the round trip through swap.
        assert_eq!(
            kernel.read_mem(page(1), AccessSize::Word).unwrap(),
            0xDEAD_BEEF
        );
        assert!(resident(&kernel, id, 2).is_none(), "{policy:?}");
        assert_eq!(kernel.space(id).unwrap().swap().stats().page_writes, 1);
    }
}

#[test]
fn misaligned_access_faults_before_lookup() {
    let (mut kernel, id) = boot(config(3, PageTableKind::Inverted, TlbPolicyKind::Fifo), 2);
    let err = kernel
        .read_mem(VirtualAddress::new(1), AccessSize::Word)
        .unwrap_err();
    assert_eq!(
        err,
        KernelError::Fault {
            space: id,
            address: VirtualAddress::new(1),
            kind: ExceptionType::AddressError,
        }
    );
    assert_eq!(kernel.stats().tlb_misses, 0);
    assert_eq!(kernel.stats().page_faults, 0);
    assert!(!err.is_fatal());
}

#[test]
fn access_past_end_of_space_is_an_address_error() {
    let (mut kernel, _) = boot(config(3, PageTableKind::Inverted, TlbPolicyKind::Fifo), 2);
    assert!(matches!(
        kernel.read_mem(page(2), AccessSize::Byte),
        Err(KernelError::Fault {
            kind: ExceptionType::AddressError,
            ..
        })
    ));
    assert!(matches!(
        kernel.handle_exception(ExceptionType::PageFault, page(5)),
        Err(KernelError::Fault {
            kind: ExceptionType::AddressError,
            ..
        })
    ));
}

#[test]
fn repeated_reads_are_deterministic() {
    let (mut kernel, id) = boot(config(3, PageTableKind::Inverted, TlbPolicyKind::Lru), 2);
    let va = page(1) + 8;
    let first = kernel.read_mem(va, AccessSize::Half).unwrap();
    let second = kernel.read_mem(va, AccessSize::Half).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, u32::from(u16::from_le_bytes([2, 2])));
    assert_eq!(kernel.space(id).unwrap().tlb_miss_count(), 1);
    assert_eq!(kernel.stats().tlb_hits, 1);
}

#[test]
fn bus_error_terminates_only_the_faulting_space() {
    let (mut kernel, id) = boot(config(3, PageTableKind::Inverted, TlbPolicyKind::Fifo), 2);
    let other = kernel.spawn(patterned_swap(2)).unwrap();
    kernel.read_mem(page(0), AccessSize::Word).unwrap();

    kernel.machine_mut().mmu_mut().tlb_mut().set(
        1,
        TranslationEntry::resident(id, VirtualPage::new(1), PhysicalFrame::new(99), 0),
    );
    let err = kernel.read_mem(page(1), AccessSize::Word).unwrap_err();
    let KernelError::Fault { kind, address, .. } = err else {
        panic!("unexpected {err:?}");
    };
    assert_eq!(kind, ExceptionType::BusError);

    assert_eq!(kernel.handle_exception(kind, address), Err(err));
    assert_eq!(kernel.space(id).unwrap_err(), KernelError::UnknownSpace(id));
    assert_eq!(kernel.current(), Err(KernelError::NoCurrentSpace));
    assert!(kernel.space(other).is_ok());
    assert_eq!(kernel.machine().free_frames(), 3);
}

#[test]
fn write_to_read_only_page_terminates_the_space() {
    let (mut kernel, id) = boot(config(3, PageTableKind::Inverted, TlbPolicyKind::Fifo), 2);
    kernel.read_mem(page(0), AccessSize::Word).unwrap();

    let mmu = kernel.machine_mut().mmu_mut();
    mmu.flush_tlb();
    mmu.mapping_mut()
        .lookup_mut(id, VirtualPage::new(0))
        .unwrap()
        .flags
        .set_read_only(true);

    assert_eq!(kernel.read_mem(page(0), AccessSize::Byte).unwrap(), 1);
    let err = kernel
        .write_mem(page(0), AccessSize::Byte, 7)
        .unwrap_err();
    assert!(matches!(
        err,
        KernelError::Fault {
            kind: ExceptionType::ReadOnly,
            ..
        }
    ));
    assert!(kernel.handle_exception(ExceptionType::ReadOnly, page(0)).is_err());
    assert!(kernel.space(id).is_err());
    assert!(!kernel.machine().is_frame_in_use(PhysicalFrame::new(0)));
}

#[test]
fn context_switch_keeps_tlb_dirty_state() {
    let (mut kernel, a) = boot(config(4, PageTableKind::Inverted, TlbPolicyKind::Fifo), 2);
    let b = kernel.spawn(patterned_swap(2)).unwrap();

    kernel.read_mem(page(0), AccessSize::Word).unwrap();
    // Hits the TLB, so only the cached copy turns dirty.
    kernel.write_mem(page(0), AccessSize::Word, 5).unwrap();
    assert!(!resident(&kernel, a, 0).unwrap().is_dirty());

    kernel.switch_to(b).unwrap();
    assert!(resident(&kernel, a, 0).unwrap().is_dirty());
    assert!(
        kernel
            .machine()
            .mmu()
            .tlb()
            .entries()
            .iter()
            .all(|e| !e.is_valid())
    );
    assert_eq!(kernel.read_mem(page(0), AccessSize::Word).unwrap(), pattern(0));
}

#[test]
fn inverted_table_evicts_across_spaces() {
    let (mut kernel, a) = boot(config(2, PageTableKind::Inverted, TlbPolicyKind::Fifo), 2);
    let b = kernel.spawn(patterned_swap(2)).unwrap();

    kernel.read_mem(page(0), AccessSize::Word).unwrap();
    kernel.switch_to(b).unwrap();
    kernel.read_mem(page(0), AccessSize::Word).unwrap();
    kernel.read_mem(page(1), AccessSize::Word).unwrap();

    assert!(resident(&kernel, a, 0).is_none());
    kernel.switch_to(a).unwrap();
    assert_eq!(kernel.read_mem(page(0), AccessSize::Word).unwrap(), pattern(0));
    assert_eq!(kernel.space(a).unwrap().page_fault_count(), 2);
}

#[test]
fn linear_tables_evict_within_the_faulting_space() {
    let table = PageTableKind::Linear { max_resident: 2 };
    let (mut kernel, a) = boot(config(4, table, TlbPolicyKind::Lru), 4);
    let b = kernel.spawn(patterned_swap(4)).unwrap();

    kernel.read_mem(page(0), AccessSize::Word).unwrap();
    kernel.read_mem(page(1), AccessSize::Word).unwrap();
    kernel.switch_to(b).unwrap();
    kernel.read_mem(page(0), AccessSize::Word).unwrap();
    kernel.read_mem(page(1), AccessSize::Word).unwrap();
    kernel.read_mem(page(2), AccessSize::Word).unwrap();

    assert!(resident(&kernel, a, 0).is_some());
    assert!(resident(&kernel, a, 1).is_some());
    assert!(resident(&kernel, b, 0).is_none());
    assert_eq!(kernel.machine().mmu().mapping().resident_count(b), 2);
}

#[test]
fn linear_spawn_is_refused_when_caps_exceed_frames() {
    let table = PageTableKind::Linear { max_resident: 4 };
    let config = config(4, table, TlbPolicyKind::Fifo);
    assert_eq!(config.validate(), Ok(()));
    let (mut kernel, a) = boot(config, 4);

    let err = kernel.spawn(patterned_swap(4)).unwrap_err();
    assert_eq!(
        err,
        KernelError::FramesReserved {
            spaces: 2,
            cap: 4,
            frames: 4
        }
    );
    assert!(!err.is_fatal());
    assert_eq!(kernel.spaces().count(), 1);

    // Once the first space is gone its frames can be reserved again.
    kernel.exit(a).unwrap();
    kernel.spawn(patterned_swap(4)).unwrap();
}

#[test]
fn linear_page_load_always_finds_a_victim() {
    let table = PageTableKind::Linear { max_resident: 2 };
    let (mut kernel, a) = boot(config(4, table, TlbPolicyKind::Fifo), 4);
    let b = kernel.spawn(patterned_swap(4)).unwrap();

    for vpn in 0..4 {
        kernel.read_mem(page(vpn), AccessSize::Word).unwrap();
    }
    kernel.switch_to(b).unwrap();
    for vpn in 0..4 {
        assert_eq!(
            kernel.read_mem(page(vpn), AccessSize::Word).unwrap(),
            pattern(u8::try_from(vpn).unwrap())
        );
    }
    assert_eq!(kernel.machine().mmu().mapping().resident_count(a), 2);
    assert_eq!(kernel.machine().mmu().mapping().resident_count(b), 2);
    assert_eq!(kernel.machine().free_frames(), 0);
}

#[test]
fn tlb_miss_handler_loads_missing_pages() {
    let (mut kernel, id) = boot(config(3, PageTableKind::Inverted, TlbPolicyKind::Fifo), 3);
    kernel
        .handle_exception(ExceptionType::TlbMiss, page(2))
        .unwrap();

    let space = kernel.space(id).unwrap();
    assert_eq!(space.tlb_miss_count(), 1);
    assert_eq!(space.page_fault_count(), 1);
    assert!(kernel.machine().mmu().tlb().find(VirtualPage::new(2)).is_some());

    kernel.handle_exception(ExceptionType::TlbMiss, page(2)).unwrap();
    assert_eq!(kernel.space(id).unwrap().page_fault_count(), 1);
}

#[test]
fn exit_releases_frames_and_swap() {
    let (mut kernel, id) = boot(config(3, PageTableKind::Inverted, TlbPolicyKind::Fifo), 4);
    kernel.read_mem(page(0), AccessSize::Word).unwrap();
    kernel.read_mem(page(3), AccessSize::Word).unwrap();
    assert_eq!(kernel.machine().free_frames(), 1);

    let finished = kernel.exit(id).unwrap();
    assert_eq!(finished.page_fault_count(), 2);
    assert_eq!(finished.swap().num_pages(), 0);
    assert_eq!(kernel.machine().free_frames(), 3);
    assert_eq!(kernel.machine().mmu().mapping().num_pages(id), None);
    assert!(kernel.exit(id).is_err());
}
