use kernel_info::config::{MachineConfig, PageTableKind, TlbPolicyKind};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalFrame, VirtualAddress, VirtualPage};
use kernel_vmem::{AccessSize, ExceptionType, Lookup, Mmu, SpaceId, TranslationEntry};

const A: SpaceId = SpaceId::new(1);
const B: SpaceId = SpaceId::new(2);

fn machine(kind: PageTableKind, policy: TlbPolicyKind) -> Mmu {
    let config = MachineConfig::new()
        .with_num_phys_pages(4)
        .with_tlb_size(2)
        .with_page_table(kind)
        .with_tlb_policy(policy);
    config.validate().unwrap();
    let mut mmu = Mmu::new(&config);
    mmu.register(A, 6).unwrap();
    mmu.register(B, 6).unwrap();
    mmu
}

fn load(mmu: &mut Mmu, owner: SpaceId, vpn: u32, frame: u32, now: u64) {
    mmu.map(TranslationEntry::resident(
        owner,
        VirtualPage::new(vpn),
        PhysicalFrame::new(frame),
        now,
    ))
    .unwrap();
}

fn word(vpn: u32) -> VirtualAddress {
    VirtualAddress::new(vpn * PAGE_SIZE)
}

#[test]
fn both_designs_translate_identically() {
    for kind in [
        PageTableKind::Inverted,
        PageTableKind::Linear { max_resident: 2 },
    ] {
        let mut mmu = machine(kind, TlbPolicyKind::Lru);
        load(&mut mmu, A, 3, 2, 0);
        load(&mut mmu, B, 3, 1, 0);

        let a = mmu.translate(A, word(3), AccessSize::Word, false, Lookup::PageTable, 1);
        let b = mmu.translate(B, word(3), AccessSize::Word, false, Lookup::PageTable, 1);
        assert_eq!(a.unwrap().as_u32(), 2 * PAGE_SIZE, "{kind:?}");
        assert_eq!(b.unwrap().as_u32(), PAGE_SIZE, "{kind:?}");
        assert_eq!(
            mmu.translate(A, word(2), AccessSize::Word, false, Lookup::PageTable, 1),
            Err(ExceptionType::PageFault),
            "{kind:?}"
        );
    }
}

#[test]
fn inverted_victim_may_belong_to_another_space() {
    let mut mmu = machine(PageTableKind::Inverted, TlbPolicyKind::Fifo);
    load(&mut mmu, B, 0, 0, 1);
    load(&mut mmu, A, 0, 1, 2);
    let victim = mmu.select_victim(A).unwrap();
    assert_eq!(victim.owner, Some(B));
}

#[test]
fn linear_victim_stays_in_the_faulting_space() {
    let mut mmu = machine(
        PageTableKind::Linear { max_resident: 2 },
        TlbPolicyKind::Fifo,
    );
    load(&mut mmu, B, 0, 0, 1);
    load(&mut mmu, A, 0, 1, 2);
    load(&mut mmu, A, 1, 2, 3);

    assert!(mmu.mapping().needs_eviction(A, 1));
    assert!(!mmu.mapping().needs_eviction(B, 1));
    let victim = mmu.select_victim(A).unwrap();
    assert_eq!(victim.owner, Some(A));
    assert_eq!(victim.virtual_page, VirtualPage::new(0));
}

#[test]
fn recent_tlb_use_protects_a_page_from_eviction() {
    let mut mmu = machine(PageTableKind::Inverted, TlbPolicyKind::Lru);
    load(&mut mmu, A, 0, 0, 1);
    load(&mut mmu, A, 1, 1, 2);
    mmu.refill_tlb(A, VirtualPage::new(0), 3).unwrap();
    mmu.translate(A, word(0), AccessSize::Word, false, Lookup::Tlb, 10)
        .unwrap();

    // Page 0 was touched at 10 through the TLB only; page 1 last at 2.
    let victim = mmu.select_victim(A).unwrap();
    assert_eq!(victim.virtual_page, VirtualPage::new(1));
}

#[test]
fn flush_keeps_dirty_state() {
    let mut mmu = machine(PageTableKind::Inverted, TlbPolicyKind::Fifo);
    load(&mut mmu, A, 4, 3, 0);
    mmu.refill_tlb(A, VirtualPage::new(4), 0).unwrap();
    mmu.translate(A, word(4), AccessSize::Half, true, Lookup::Tlb, 1)
        .unwrap();
    mmu.flush_tlb();

    assert!(mmu.tlb().entries().iter().all(|e| !e.is_valid()));
    assert!(mmu.mapping().lookup(A, VirtualPage::new(4)).unwrap().is_dirty());
    assert_eq!(
        mmu.translate(A, word(4), AccessSize::Word, false, Lookup::Tlb, 2),
        Err(ExceptionType::TlbMiss)
    );
}
