//! Demo driver: boots the machine and walks the paging subsystem through
//! the classic workloads — small allocations with first-fit reuse, lazy
//! frame binding, a deliberate segmentation fault, and an eviction/swap-in
//! round trip.

mod logger;

use kernel_machine::layout::{FFS_FRAMES, SWAP_FRAMES};
use kernel_memory_addresses::PAGE_SIZE;
use kernel_paging::{BootOptions, Kernel, Pid};
use log::{info, LevelFilter};
use logger::ConsoleLogger;

fn process_info(kernel: &Kernel, pid: Pid) {
    info!(
        "{pid}:: virtual pages = {}, FFS frames = {}",
        kernel.allocated_virtual_pages(pid),
        kernel.used_ffs_frames(pid)
    );
}

fn ffs_and_swap_info(kernel: &Kernel) {
    info!(
        "FFS frames in use:: {}/{FFS_FRAMES}",
        FFS_FRAMES - kernel.free_ffs_pages()
    );
    info!(
        "swap frames in use:: {}/{SWAP_FRAMES}",
        SWAP_FRAMES - kernel.free_swap_pages()
    );
}

/// Small allocations: first-fit placement, failed partial free, hole reuse,
/// lazy binding, and a stray access that kills the process.
fn small_allocations(kernel: &mut Kernel) {
    let pid = kernel.vcreate("small", 1).expect("vcreate failed");
    kernel.switch_to(pid).expect("switch failed");

    info!("{pid}:: allocating 8/4/2/8 pages...");
    let ptr1 = kernel.vmalloc(8 * PAGE_SIZE).unwrap();
    let ptr2 = kernel.vmalloc(4 * PAGE_SIZE).unwrap();
    let ptr3 = kernel.vmalloc(2 * PAGE_SIZE).unwrap();
    let ptr4 = kernel.vmalloc(8 * PAGE_SIZE).unwrap();
    info!("{pid}:: ptr1={ptr1}, ptr2={ptr2}, ptr3={ptr3}, ptr4={ptr4}");
    process_info(kernel, pid);

    info!("{pid}:: freeing 40 pages @ ptr1 (should fail)...");
    match kernel.vfree(ptr1, 40 * PAGE_SIZE) {
        Err(e) => info!("{pid}:: vfree failed as expected: {e}"),
        Ok(()) => info!("{pid}:: ERROR - vfree error not handled correctly"),
    }

    info!("{pid}:: freeing 6 pages @ ptr2...");
    kernel.vfree(ptr2, 6 * PAGE_SIZE).unwrap();
    process_info(kernel, pid);

    info!("{pid}:: allocating 5 pages, then 8 pages...");
    let ptr5 = kernel.vmalloc(5 * PAGE_SIZE).unwrap();
    let ptr6 = kernel.vmalloc(8 * PAGE_SIZE).unwrap();
    info!("{pid}:: ptr5={ptr5} (reused hole), ptr6={ptr6}");

    info!("{pid}:: touching 3 pages...");
    kernel.write_byte(ptr1, 1).unwrap();
    kernel.write_byte(ptr1 + 4, 1).unwrap();
    kernel.write_byte(ptr4 + PAGE_SIZE, 1).unwrap();
    process_info(kernel, pid);
    info!("free FFS pages = {} out of {FFS_FRAMES}", kernel.free_ffs_pages());

    info!("{pid}:: accessing one page past ptr6...");
    match kernel.touch(ptr6 + 8 * PAGE_SIZE) {
        Err(killed) => info!("{killed}"),
        Ok(()) => info!("{pid}:: ERROR - process should already be killed!"),
    }
    ffs_and_swap_info(kernel);
}

/// Overcommit the physical pool and watch a page make the round trip
/// through swap.
fn swap_round_trip(kernel: &mut Kernel) {
    let pid = kernel.vcreate("swapper", 1).expect("vcreate failed");
    kernel.switch_to(pid).expect("switch failed");

    let pages = FFS_FRAMES as u32 + 1;
    info!("{pid}:: allocating {pages} pages (one more than FFS holds)...");
    let ptr = kernel.vmalloc(pages * PAGE_SIZE).unwrap();

    info!("{pid}:: writing a marker into page 0...");
    kernel.write_byte(ptr, b'A').unwrap();

    info!("{pid}:: touching the remaining {} pages...", pages - 1);
    for i in 1..pages {
        kernel.touch(ptr + i * PAGE_SIZE).unwrap();
    }
    ffs_and_swap_info(kernel);

    info!("{pid}:: reading page 0 back...");
    let byte = kernel.read_byte(ptr).unwrap();
    info!(
        "{pid}:: page 0 read back {:?} ({})",
        byte as char,
        if byte == b'A' { "intact" } else { "CORRUPTED" }
    );

    kernel.switch_to(Pid::SYSTEM).unwrap();
    kernel.kill(pid).unwrap();
    ffs_and_swap_info(kernel);
}

fn main() {
    ConsoleLogger::new(LevelFilter::Info)
        .init()
        .expect("logger already set");

    let mut kernel = Kernel::boot(BootOptions {
        swap: true,
        swap_trace_lines: 50,
    });
    ffs_and_swap_info(&kernel);

    info!("================== small allocations ==================");
    small_allocations(&mut kernel);

    info!("================== swap round trip ====================");
    swap_round_trip(&mut kernel);

    info!("done; free FFS pages = {}", kernel.free_ffs_pages());
}
