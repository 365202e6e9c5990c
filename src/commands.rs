use std::time::Duration;

use anyhow::Result;

use crate::cli::{Cli, SplitArgs, ValidateArgs};
use crate::config::Config;
use crate::model::job::{Job, JobRequest, JobState};
use crate::orchestrator::Orchestrator;
use crate::reader::ShapefileDirSource;
use crate::splitter::{self, SplitConfig};

fn config_for(args: &ValidateArgs) -> Config {
    let defaults = Config::from_env();
    Config {
        config_dir: args.config_dir.clone().unwrap_or(defaults.config_dir),
        work_dir: args.work_dir.clone().unwrap_or(defaults.work_dir),
        bind_addr: defaults.bind_addr,
    }
}

pub fn validate(cli: &Cli, args: &ValidateArgs) -> Result<()> {
    let config = config_for(args);
    if cli.verbose > 0 {
        eprintln!("[validate] gdb_path={}", args.gdb_path.display());
        eprintln!("[validate] config_dir={}", config.config_dir.display());
    }

    let orchestrator = Orchestrator::new(config);
    let request = JobRequest {
        gdb_path: args.gdb_path.clone(),
        stages: args.stages.clone().unwrap_or_else(|| vec![1, 2, 3, 4, 5]),
        stop_on_table_check_failure: args.stop_on_table_check_failure,
    };

    let rt = tokio::runtime::Runtime::new()?;
    let job = rt.block_on(run_until_terminal(orchestrator, request))?;

    println!("job {} finished as {:?}", job.job_id, job.state);
    println!("errors={} warnings={}", job.error_count, job.warning_count);
    if job.state != JobState::Completed {
        anyhow::bail!("validation job did not complete successfully");
    }
    Ok(())
}

async fn run_until_terminal(orchestrator: std::sync::Arc<Orchestrator>, request: JobRequest) -> Result<Job> {
    let job_id = orchestrator.create_job(request)?;
    orchestrator.start(&job_id)?;
    loop {
        let job = orchestrator.status(&job_id)?;
        if job.state.is_terminal() {
            return Ok(job);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

pub fn split(cli: &Cli, args: &SplitArgs) -> Result<()> {
    if cli.verbose > 0 {
        eprintln!("[split] gdb_path={} -> {}", args.gdb_path.display(), args.out_dir.display());
    }

    let source = ShapefileDirSource::open(&args.gdb_path)?;
    let config = SplitConfig {
        max_bytes_per_part: args.max_bytes_per_part.unwrap_or_else(|| SplitConfig::default().max_bytes_per_part),
    };
    let results = splitter::split(&source, &args.out_dir, &config)?;
    for result in &results {
        println!("{}: {} features across {} part(s)", result.layer_id, result.feature_count, result.parts.len());
    }
    Ok(())
}
