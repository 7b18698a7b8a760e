//! End-to-end scenarios: whole-subsystem workloads driven the way user
//! programs drive the real thing (allocate, touch, free, die), observing
//! only the public counters and the swap journal.

use kernel_machine::layout::{FFS_FRAMES, KERNEL_IMAGE_PAGES, SWAP_FRAMES, VHEAP_START};
use kernel_memory_addresses::{VirtualAddress, PAGE_SIZE};
use kernel_paging::{BootOptions, KillReason, Kernel, SwapEvent};

const F: u32 = FFS_FRAMES as u32;

fn boot() -> Kernel {
    Kernel::boot(BootOptions::default())
}

fn boot_with_swap() -> Kernel {
    Kernel::boot(BootOptions {
        swap: true,
        swap_trace_lines: 50,
    })
}

/// Byte address of page `i` of an allocation at `base`.
fn page_addr(base: VirtualAddress, i: u32) -> VirtualAddress {
    base + i * PAGE_SIZE
}

#[test]
fn half_fill_and_drain() {
    let mut k = boot();
    let pid = k.vcreate("half", 50).unwrap();
    k.switch_to(pid).unwrap();

    assert_eq!(k.free_ffs_pages(), FFS_FRAMES);
    assert_eq!(k.allocated_virtual_pages(pid), KERNEL_IMAGE_PAGES);

    let ptr = k.vmalloc((F / 2) * PAGE_SIZE).unwrap();
    assert_eq!(ptr.as_u32(), VHEAP_START);
    assert_eq!(k.allocated_virtual_pages(pid), KERNEL_IMAGE_PAGES + F / 2);
    // Lazy binding: the reservation consumed no frame.
    assert_eq!(k.used_ffs_frames(pid), 0);

    for i in 0..F / 2 {
        k.touch(page_addr(ptr, i)).unwrap();
    }
    assert_eq!(k.used_ffs_frames(pid), (F / 2) as usize);
    assert_eq!(k.free_ffs_pages(), (F / 2) as usize);

    k.vfree(ptr, (F / 2) * PAGE_SIZE).unwrap();
    assert_eq!(k.used_ffs_frames(pid), 0);
    assert_eq!(k.free_ffs_pages(), FFS_FRAMES);
    assert_eq!(k.allocated_virtual_pages(pid), KERNEL_IMAGE_PAGES);
}

#[test]
fn exhausting_ffs_without_swap_kills_with_oom() {
    let mut k = boot();
    let pid = k.vcreate("exhaust", 50).unwrap();
    k.switch_to(pid).unwrap();

    let ptr = k.vmalloc((F + 1) * PAGE_SIZE).unwrap();
    for i in 0..F {
        k.touch(page_addr(ptr, i)).unwrap();
    }
    assert_eq!(k.free_ffs_pages(), 0);

    // One page too many: no frame, no swap, the process dies.
    let err = k.touch(page_addr(ptr, F)).unwrap_err();
    assert_eq!(err.pid, pid);
    assert_eq!(err.reason, KillReason::OutOfMemory);

    // Teardown returned everything.
    assert!(k.user_pids().is_empty());
    assert_eq!(k.free_ffs_pages(), FFS_FRAMES);
    assert_eq!(k.used_ffs_frames(pid), 0);
}

#[test]
fn sequential_tenants_share_one_boot() {
    let mut k = boot();

    for round in 0..2 {
        let pid = k.vcreate("tenant", 50).unwrap();
        k.switch_to(pid).unwrap();

        let ptr = k.vmalloc((F / 2) * PAGE_SIZE).unwrap();
        assert_eq!(k.used_ffs_frames(pid), 0, "round {round}");
        for i in 0..F / 2 {
            k.touch(page_addr(ptr, i)).unwrap();
        }
        assert_eq!(k.used_ffs_frames(pid), (F / 2) as usize, "round {round}");
        assert_eq!(k.free_ffs_pages(), (F / 2) as usize, "round {round}");

        k.vfree(ptr, (F / 2) * PAGE_SIZE).unwrap();
        assert_eq!(k.free_ffs_pages(), FFS_FRAMES, "round {round}");

        k.switch_to(kernel_paging::Pid::SYSTEM).unwrap();
        k.kill(pid).unwrap();
    }
}

#[test]
fn four_concurrent_tenants_fill_the_pool() {
    let mut k = boot();
    let quarter = F / 4;

    let pids: Vec<_> = (0..4)
        .map(|i| k.vcreate(&format!("t{i}"), 50).unwrap())
        .collect();

    let mut ptrs = Vec::new();
    for &pid in &pids {
        k.switch_to(pid).unwrap();
        let ptr = k.vmalloc(quarter * PAGE_SIZE).unwrap();
        for i in 0..quarter {
            k.touch(page_addr(ptr, i)).unwrap();
        }
        ptrs.push(ptr);
    }

    assert_eq!(k.free_ffs_pages(), 0);
    let total: usize = pids.iter().map(|&p| k.used_ffs_frames(p)).sum();
    assert_eq!(total, FFS_FRAMES);

    k.switch_to(kernel_paging::Pid::SYSTEM).unwrap();
    for pid in pids {
        k.kill(pid).unwrap();
    }
    assert_eq!(k.free_ffs_pages(), FFS_FRAMES);
}

#[test]
fn overallocate_underuse() {
    let mut k = boot();
    let pid = k.vcreate("big", 50).unwrap();
    k.switch_to(pid).unwrap();

    // Twice the physical pool reserves fine at the region level.
    let ptr = k.vmalloc(2 * F * PAGE_SIZE).unwrap();
    assert_eq!(k.allocated_virtual_pages(pid), KERNEL_IMAGE_PAGES + 2 * F);

    for i in 0..F {
        k.touch(page_addr(ptr, i)).unwrap();
    }
    assert_eq!(k.used_ffs_frames(pid), FFS_FRAMES);
    assert_eq!(k.allocated_virtual_pages(pid), KERNEL_IMAGE_PAGES + 2 * F);
    assert_eq!(k.free_ffs_pages(), 0);
}

#[test]
fn access_outside_any_region_segfaults() {
    let mut k = boot();
    let pid = k.vcreate("stray", 50).unwrap();
    k.switch_to(pid).unwrap();

    let ptr = k.vmalloc(8 * PAGE_SIZE).unwrap();
    k.touch(ptr).unwrap();
    let used_before = FFS_FRAMES - k.free_ffs_pages();

    // One page past the allocation: no region covers it.
    let err = k.touch(page_addr(ptr, 8)).unwrap_err();
    assert_eq!(err.pid, pid);
    assert_eq!(err.reason, KillReason::SegmentationFault);

    // Nothing left behind but the teardown.
    assert!(k.user_pids().is_empty());
    assert_eq!(k.free_ffs_pages(), FFS_FRAMES);
    assert_eq!(used_before, 1);
}

#[test]
fn swap_round_trip_preserves_contents() {
    let mut k = boot_with_swap();
    let pid = k.vcreate("swapper", 50).unwrap();
    k.switch_to(pid).unwrap();

    let ptr = k.vmalloc(2 * F * PAGE_SIZE).unwrap();
    k.write_byte(ptr, b'A').unwrap();

    // Fill the rest of the pool, then one more page to force an eviction.
    for i in 1..=F {
        k.touch(page_addr(ptr, i)).unwrap();
    }

    // Page 0 was the coldest page under the clock: the eviction names its
    // frame, and the slot it went to.
    let evictions: Vec<_> = k
        .swap_events()
        .iter()
        .filter(|e| matches!(e, SwapEvent::Eviction { .. }))
        .collect();
    assert_eq!(
        evictions.first(),
        Some(&&SwapEvent::Eviction {
            ffs_index: 0,
            swap_index: 0
        })
    );
    assert_eq!(k.free_swap_pages(), SWAP_FRAMES - 1);

    // Reading page 0 swaps it back in and the payload survived the trip.
    assert_eq!(k.read_byte(ptr).unwrap(), b'A');
    assert!(k
        .swap_events()
        .iter()
        .any(|e| matches!(e, SwapEvent::SwapIn { swap_index: 0, .. })));

    // The swap-in itself had to evict, so exactly one slot stays used.
    assert_eq!(k.free_swap_pages(), SWAP_FRAMES - 1);
    assert_eq!(k.free_ffs_pages(), 0);
}
