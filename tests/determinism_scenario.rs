//! Determinism invariant (spec.md §8): running the same job twice against
//! the same source and rule set yields identical error multisets by
//! `rule_id + code + table_id + feature_id + metadata`.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use geoqc::config::Config;
use geoqc::model::error_record::ValidationError;
use geoqc::model::job::{JobRequest, JobState};
use geoqc::orchestrator::Orchestrator;
use geoqc::reader::integrity::SENTINEL_FILE;
use geoqc::sink::PageFilter;

fn write_rule_csvs(config_dir: &Path) {
    fs::create_dir_all(config_dir).unwrap();
    fs::write(
        config_dir.join("table.csv"),
        "rule_id,table_id,table_name,expected_geom_type,expected_epsg,enabled\n\
         r1,tn_buld,Buildings,Polygon,5186,Y\n\
         r2,tn_road,Roads,LineString,5186,Y\n",
    )
    .unwrap();
    fs::write(config_dir.join("schema.csv"), "rule_id,table_id,field_name,data_type,enabled\n").unwrap();
    fs::write(config_dir.join("geometry.csv"), "rule_id,table_id,geom_type,flags,filter,enabled\n").unwrap();
    fs::write(config_dir.join("relation.csv"), "rule_id,case_type,main_table,related_table,filter,tolerance,params,enabled\n").unwrap();
    fs::write(config_dir.join("attribute.csv"), "rule_id,table_id,field,check_type,params,enabled\n").unwrap();
    fs::write(config_dir.join("criteria.csv"), "min_line_length\n").unwrap();
    fs::write(config_dir.join("codelist.csv"), "code_set_id,value\n").unwrap();
}

fn dedupe_key(e: &ValidationError) -> (String, String, String, Option<i64>, Vec<(String, String)>) {
    let mut metadata: Vec<(String, String)> = e.metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    metadata.sort();
    (e.rule_id.clone(), e.code.clone(), e.table_id.clone(), e.feature_id, metadata)
}

async fn run_once(dir: &Path) -> Vec<ValidationError> {
    let source_dir = dir.join("source");
    if !source_dir.exists() {
        fs::create_dir_all(&source_dir).unwrap();
        fs::write(source_dir.join(SENTINEL_FILE), "").unwrap();
    }
    let config_dir = dir.join("config");
    if !config_dir.exists() {
        write_rule_csvs(&config_dir);
    }

    let config = Config {
        config_dir,
        work_dir: dir.join(format!("work_{}", uuid::Uuid::new_v4().simple())),
        bind_addr: "127.0.0.1:0".into(),
    };
    let orchestrator = Orchestrator::new(config);

    let request = JobRequest {
        gdb_path: source_dir,
        stages: vec![1],
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
    assert_eq!(job.state, JobState::Completed);

    orchestrator
        .errors(&job_id, 0, 100, &PageFilter::default())
        .unwrap()
        .errors
}

#[tokio::test]
async fn same_input_twice_yields_identical_error_multiset() {
    let dir = tempfile::tempdir().unwrap();

    let first = run_once(dir.path()).await;
    let second = run_once(dir.path()).await;

    assert!(!first.is_empty());
    let first_keys: HashSet<_> = first.iter().map(dedupe_key).collect();
    let second_keys: HashSet<_> = second.iter().map(dedupe_key).collect();
    assert_eq!(first_keys, second_keys);
    assert_eq!(first.len(), second.len());
}
