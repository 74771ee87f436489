use std::fs;
use std::path::Path;

use csvplan::error::PipelineError;
use csvplan::{
    process_file, read_table, run_pipeline, PipelineOptions, PipelinePlan, PlanOptions,
    ReadOptions, TransformationPlan, Value,
};

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn options(dir: &Path) -> PipelineOptions {
    PipelineOptions {
        base_dir: Some(dir.to_path_buf()),
        ..Default::default()
    }
}

#[test]
fn merge_stage_is_an_inner_join() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "left.csv", "id,a\n1,x\n2,y\n");
    write(dir.path(), "right.csv", "id,b\n1,p\n3,q\n");

    let plan = PipelinePlan::from_yaml(
        "- merge:\n    input_file1: left.csv\n    input_file2: right.csv\n    output_file: joined.csv\n    key_column: id\n",
    )
    .unwrap();
    let report = run_pipeline(&plan, &options(dir.path()));
    assert!(report.is_success(), "{}", report.summary());

    let content = fs::read_to_string(dir.path().join("joined.csv")).unwrap();
    assert_eq!(content, "id,a,b\n1,x,p\n");
}

#[test]
fn failing_stage_does_not_stop_later_stages() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "people.csv", "Name,Age,City\nJohn Doe,25,Paris\nJane Smith,30,Lyon\n");

    let plan = PipelinePlan::from_yaml(
        "- merge:\n    input_file1: people.csv\n    input_file2: nowhere.csv\n    output_file: never.csv\n    key_column: Name\n\
         - split:\n    input_file: people.csv\n    output_definitions:\n      bad.csv: [Name, Salary]\n      names.csv: [Name]\n\
         - split:\n    input_file: people.csv\n    output_definitions:\n      names.csv: [Name]\n      places.csv: [City, Name]\n",
    )
    .unwrap();
    let report = run_pipeline(&plan, &options(dir.path()));

    assert_eq!(report.stages.len(), 3);
    assert_eq!(report.failed(), 2);
    assert!(matches!(report.stages[0].outcome, Err(PipelineError::Csv(_))));
    assert!(matches!(report.stages[1].outcome, Err(PipelineError::Validation(_))));
    assert!(report.stages[2].is_success());

    // The failed split wrote nothing, not even its valid projection.
    assert!(!dir.path().join("bad.csv").exists());
    assert!(!dir.path().join("never.csv").exists());

    assert_eq!(
        fs::read_to_string(dir.path().join("places.csv")).unwrap(),
        "City,Name\nParis,John Doe\nLyon,Jane Smith\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("names.csv")).unwrap(),
        "Name\nJohn Doe\nJane Smith\n"
    );
}

#[test]
fn process_stage_runs_nested_plan() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "people.csv", "Name,Age,Location\nJohn Doe,25,New York\nJane Smith,30,New Orleans\n");
    write(
        dir.path(),
        "plan.json",
        r#"[
            {"split": {"column": "Name", "separator": " "}},
            {"merge": {"columns": ["Name_2", "Name_1"], "output_column": "Sort_Name", "separator": ", "}},
            {"filter_records": {"condition": "Age > 25"}},
            {"replace": {"column": "Location", "match_value": "New", "replacement": "Old"}},
            {"filter": {"columns": ["Sort_Name", "Location", "Age"]}}
        ]"#,
    );
    write(
        dir.path(),
        "pipeline.yaml",
        "- process:\n    input_file: people.csv\n    transformation_file: plan.json\n    output_file: out.csv\n",
    );

    let plan = PipelinePlan::from_path(&dir.path().join("pipeline.yaml"), PlanOptions::default()).unwrap();
    let report = run_pipeline(&plan, &options(dir.path()));
    assert!(report.is_success(), "{}", report.summary());

    let out = read_table(dir.path().join("out.csv"), &ReadOptions::default()).unwrap();
    assert_eq!(out.column_names(), vec!["Sort_Name", "Location", "Age"]);
    assert_eq!(
        out.row(0),
        vec![&Value::text("Smith, Jane"), &Value::text("Old Orleans"), &Value::Int(30)]
    );
}

#[test]
fn process_stage_reports_unknown_transformation() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "in.csv", "a\n1\n");
    write(dir.path(), "plan.yaml", "- explode:\n    column: a\n- convert: a\n");
    write(
        dir.path(),
        "pipeline.yaml",
        "- process:\n    input_file: in.csv\n    transformation_file: plan.yaml\n    output_file: out.csv\n",
    );
    let plan = PipelinePlan::from_path(&dir.path().join("pipeline.yaml"), PlanOptions::default()).unwrap();

    let strict = run_pipeline(&plan, &options(dir.path()));
    assert!(matches!(strict.stages[0].outcome, Err(PipelineError::Plan(_))));
    assert!(!dir.path().join("out.csv").exists());

    let lenient = PipelineOptions {
        plan: PlanOptions { skip_unknown: true },
        ..options(dir.path())
    };
    assert!(run_pipeline(&plan, &lenient).is_success());
    assert_eq!(fs::read_to_string(dir.path().join("out.csv")).unwrap(), "a\n1\n");
}

#[test]
fn process_file_keeps_output_untouched_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "in.csv", "Name,Age\nJohn Doe,25\n,30\n");
    let plan = TransformationPlan::from_yaml("- check_not_blank:\n    columns: [Name]\n").unwrap();

    let err = process_file(
        &dir.path().join("in.csv"),
        &plan,
        &dir.path().join("out.csv"),
        &ReadOptions::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("blank value in column 'Name' at row 1"));
    assert!(!dir.path().join("out.csv").exists());
}

#[test]
fn semicolon_delimiter_is_detected_in_latin1_input() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = b"Nom;Ville\n".to_vec();
    bytes.extend_from_slice(b"Ren\xe9;Orl\xe9ans\n");
    fs::write(dir.path().join("in.csv"), bytes).unwrap();

    let read = ReadOptions {
        encoding: Some("latin-1".to_string()),
        delimiter: None,
    };
    let plan = TransformationPlan::from_yaml("- convert_case:\n    mapping:\n      Ville: uppercase\n").unwrap();
    process_file(&dir.path().join("in.csv"), &plan, &dir.path().join("out.csv"), &read).unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("out.csv")).unwrap(),
        "Nom,Ville\nRené,ORLÉANS\n"
    );
}

#[test]
fn demo_pipeline_runs_end_to_end() {
    let demos = Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos");
    let dir = tempfile::tempdir().unwrap();
    for name in ["people.csv", "cities.csv", "plan.yaml", "pipeline.yaml"] {
        fs::copy(demos.join(name), dir.path().join(name)).unwrap();
    }

    let plan = PipelinePlan::from_path(&dir.path().join("pipeline.yaml"), PlanOptions::default()).unwrap();
    let report = run_pipeline(&plan, &options(dir.path()));
    assert!(report.is_success(), "{}", report.summary());

    let joined = read_table(dir.path().join("people_states.csv"), &ReadOptions::default()).unwrap();
    assert_eq!(joined.column_names(), vec!["Name", "Age", "Location", "State"]);
    assert_eq!(joined.row_count(), 3);
    assert_eq!(
        fs::read_to_string(dir.path().join("places.csv")).unwrap(),
        "Location,State\nNew York,NY\nNew Orleans,LA\nBoston,MA\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("people_out.csv")).unwrap(),
        "Sort_Name,Age,Location\n\"SMITH, JANE\",30,Old Orleans\n"
    );

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["stages"][2]["summary"]["rows"][0], 1);
}
