/*
 * Coremap Tests
 *
 * Exercises the frame allocator's accounting invariants directly,
 * independent of any address space.
 */

use super::{check, TestResult};
use crate::memory::coremap;

const TEST_FRAMES: usize = 64;

pub fn run() -> TestResult {
    let mut result = TestResult::new("coremap");

    coremap::reset_for_test(TEST_FRAMES);
    let initial_free = coremap::free_frame_count();
    check(&mut result, "initial free count equals total", initial_free == coremap::total_frame_count());

    let vaddr = coremap::alloc_kpages(1);
    check(&mut result, "single alloc succeeds", vaddr != 0);
    check(&mut result, "single alloc decrements free count", coremap::free_frame_count() == initial_free - 1);
    coremap::free_kpages(vaddr);
    check(&mut result, "freeing restores free count", coremap::free_frame_count() == initial_free);

    coremap::reset_for_test(TEST_FRAMES);
    let run = coremap::alloc_kpages(4);
    check(&mut result, "run alloc succeeds", run != 0);
    check(&mut result, "run alloc takes exactly the requested frames", coremap::free_frame_count() == TEST_FRAMES - 4);
    coremap::free_kpages(run);
    check(&mut result, "freeing a run restores every frame", coremap::free_frame_count() == TEST_FRAMES);

    coremap::reset_for_test(TEST_FRAMES);
    let exhausting = coremap::alloc_kpages(TEST_FRAMES);
    check(&mut result, "a request for exactly the free count fails", exhausting == 0);
    let almost_all = coremap::alloc_kpages(TEST_FRAMES - 1);
    check(&mut result, "a request for one less than the free count succeeds", almost_all != 0);
    coremap::free_kpages(almost_all);

    coremap::reset_for_test(TEST_FRAMES);
    result
}
