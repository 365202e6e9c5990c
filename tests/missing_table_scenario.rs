//! End-to-end "missing table" scenario (spec.md §8): a `table.csv` rule
//! names a layer the source doesn't have. Drives the real `Orchestrator`
//! through CSV rule loading rather than constructing a `RuleSet` by hand,
//! to exercise the whole `create_job` -> `start` -> Stage 1 -> sink path.

use std::fs;
use std::path::Path;
use std::time::Duration;

use geoqc::config::Config;
use geoqc::model::job::{JobRequest, JobState};
use geoqc::orchestrator::Orchestrator;
use geoqc::reader::integrity::SENTINEL_FILE;
use geoqc::sink::PageFilter;

fn write_rule_csvs(config_dir: &Path) {
    fs::create_dir_all(config_dir).unwrap();
    fs::write(
        config_dir.join("table.csv"),
        "rule_id,table_id,table_name,expected_geom_type,expected_epsg,enabled\n\
         r1,tn_buld,Buildings,Polygon,5186,Y\n",
    )
    .unwrap();
    fs::write(config_dir.join("schema.csv"), "rule_id,table_id,field_name,data_type,enabled\n").unwrap();
    fs::write(config_dir.join("geometry.csv"), "rule_id,table_id,geom_type,flags,filter,enabled\n").unwrap();
    fs::write(config_dir.join("relation.csv"), "rule_id,case_type,main_table,related_table,filter,tolerance,params,enabled\n").unwrap();
    fs::write(config_dir.join("attribute.csv"), "rule_id,table_id,field,check_type,params,enabled\n").unwrap();
    fs::write(config_dir.join("criteria.csv"), "min_line_length\n").unwrap();
    fs::write(config_dir.join("codelist.csv"), "code_set_id,value\n").unwrap();
}

#[tokio::test]
async fn missing_table_reports_tbl001_but_job_still_completes() {
    let dir = tempfile::tempdir().unwrap();

    let source_dir = dir.path().join("source");
    fs::create_dir_all(&source_dir).unwrap();
    fs::write(source_dir.join(SENTINEL_FILE), "").unwrap();

    let config_dir = dir.path().join("config");
    write_rule_csvs(&config_dir);

    let config = Config {
        config_dir,
        work_dir: dir.path().join("work"),
        bind_addr: "127.0.0.1:0".into(),
    };
    let orchestrator = Orchestrator::new(config);

    let request = JobRequest {
        gdb_path: source_dir,
        stages: vec![1, 2, 3, 4, 5],
        stop_on_table_check_failure: false,
    };
    let job_id = orchestrator.create_job(request).unwrap();
    orchestrator.start(&job_id).unwrap();

    let mut job = orchestrator.status(&job_id).unwrap();
    for _ in 0..200 {
        if job.state.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        job = orchestrator.status(&job_id).unwrap();
    }

    assert_eq!(job.state, JobState::Completed, "stage 1 findings are data errors, not system failures");
    assert!(job.error_count >= 1);

    let page = orchestrator.errors(&job_id, 0, 10, &PageFilter { stage: Some(1), rule_id: None }).unwrap();
    assert!(page.errors.iter().any(|e| e.code == "TBL001"));
}
