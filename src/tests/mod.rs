/*
 * Boot-Time Test Suite
 *
 * Plain functions run once from `_start` after the root process is up,
 * each exercising one subsystem's invariants against real coremap/page-
 * table/process-table state rather than mocks. Failures are logged and
 * counted, not panicked on, so one broken property doesn't hide the rest.
 */

mod address_space;
mod coremap;
mod fd;
mod process;

/// Accumulates pass/fail counts for one subsystem's checks.
pub struct TestResult {
    name: &'static str,
    passed: u32,
    failed: u32,
}

impl TestResult {
    fn new(name: &'static str) -> Self {
        Self { name, passed: 0, failed: 0 }
    }

    fn ok(&self) -> bool {
        self.failed == 0
    }
}

/// Records one assertion, logging on failure immediately so the cause is
/// visible even if a later check in the same suite panics.
fn check(result: &mut TestResult, description: &str, condition: bool) {
    if condition {
        result.passed += 1;
    } else {
        result.failed += 1;
        log::error!("[{}] FAILED: {}", result.name, description);
    }
}

/// Runs every subsystem's checks and logs a final summary. Does not
/// panic on failure — a broken invariant is reported, not fatal, so the
/// kernel can still reach its idle loop for inspection.
pub fn run_all() {
    log::info!("running boot-time test suite");

    let suites = [coremap::run(), address_space::run(), fd::run(), process::run()];

    let mut total_passed = 0u32;
    let mut total_failed = 0u32;
    for suite in &suites {
        log::info!("[{}] {} passed, {} failed", suite.name, suite.passed, suite.failed);
        total_passed += suite.passed;
        total_failed += suite.failed;
    }

    if suites.iter().all(TestResult::ok) {
        log::info!("test suite: {} checks passed, 0 failed", total_passed);
    } else {
        log::error!("test suite: {} checks passed, {} FAILED", total_passed, total_failed);
    }
}
