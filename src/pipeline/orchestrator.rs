// 全ジョブ実行

use rayon::prelude::*;

use crate::log::Logger;
use crate::pipeline::job_runner::{JobConfig, JobResult, run_job};

/// Run multiple jobs in parallel, collecting results in input order.
/// One job failure does NOT prevent other jobs from running.
///
/// `workers == 0` uses rayon's global pool.
pub fn run_all_jobs(
    jobs: &[JobConfig],
    workers: usize,
    logger: &Logger,
) -> Vec<crate::error::Result<JobResult>> {
    let run = || -> Vec<_> { jobs.par_iter().map(|job| run_job(job, logger)).collect() };

    if workers == 0 {
        return run();
    }
    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool.install(run),
        Err(e) => {
            logger.warn(&format!(
                "could not build a {workers}-thread pool ({e}); using the global pool"
            ));
            run()
        }
    }
}
