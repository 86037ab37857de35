mod common;

use assert_cmd::Command;
use common::TestWorkspace;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::Value as Json;

const SALES: &str = "region,sales,units\nEast,10,1\nEast,20,2\nWest,5,3\n";

const PLAN: &str = r#"{
    "plan_version": "1.0",
    "x": "region",
    "y": [{"field": "sales", "fn": "sum"}],
    "output_format": "wide",
    "ops": [
        {"op": "groupby", "by": ["region"]},
        {"op": "aggregate", "aggs": [{"fn": "sum", "col": "sales"}]}
    ]
}"#;

fn chartops() -> Command {
    Command::cargo_bin("chartops").expect("binary exists")
}

fn stdout_json(command: &mut Command) -> Json {
    let output = command.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("json output")
}

#[test]
fn run_prints_grouped_rows_as_json() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write("sales.csv", SALES);
    let plan = workspace.write("plan.json", PLAN);
    let json = stdout_json(chartops().args([
        "run",
        "-i",
        csv.to_str().unwrap(),
        "-p",
        plan.to_str().unwrap(),
    ]));
    assert_eq!(json[0]["region"], "East");
    assert_eq!(json[0]["sales"], 30.0);
    assert_eq!(json[0]["sales"].as_i64(), Some(30));
    assert_eq!(json[1]["region"], "West");
    assert_eq!(json.as_array().unwrap().len(), 2);
}

#[test]
fn run_accepts_yaml_plan_and_writes_table_to_file() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write("sales.csv", SALES);
    let plan = workspace.write(
        "plan.yaml",
        "plan_version: '1'\nx: region\ny:\n  - field: units\n    fn: max\noutput_format: wide\nops:\n  - op: groupby\n    by: [region]\n  - op: aggregate\n    aggs:\n      - fn: max\n        col: units\n",
    );
    let out = workspace.path().join("out.txt");
    chartops()
        .args([
            "run",
            "-i",
            csv.to_str().unwrap(),
            "-p",
            plan.to_str().unwrap(),
            "--table",
            "-o",
            out.to_str().unwrap(),
        ])
        .assert()
        .success();
    let rendered = std::fs::read_to_string(&out).unwrap();
    let lines = rendered.lines().collect::<Vec<_>>();
    assert_eq!(lines[0], "region  units");
    assert_eq!(lines[2], "East    2");
    assert_eq!(lines[3], "West    3");
}

#[test]
fn run_reports_unsupported_operator() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write("sales.csv", SALES);
    let plan = workspace.write(
        "plan.json",
        r#"{"plan_version":"1","x":"region","y":[],"output_format":"wide",
            "ops":[{"op":"filter","where":[{"col":"region","op":"regex","val":"E"}]}]}"#,
    );
    chartops()
        .args(["run", "-i", csv.to_str().unwrap(), "-p", plan.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("error: Running plan"));
}

#[test]
fn shape_bar_with_semicolon_delimiter() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write("ratings.csv", "product;rating\nA;4\nA;2\nB;5\n");
    let json = stdout_json(chartops().args([
        "shape",
        "-i",
        csv.to_str().unwrap(),
        "--delimiter",
        ";",
        "--chart",
        "BAR_CHART",
        "-x",
        "product",
        "-y",
        "rating",
    ]));
    assert_eq!(json[0]["product"], "B");
    assert_eq!(json[0]["rating"], 5.0);
    assert_eq!(json[1]["rating"], 3.0);
}

#[test]
fn shape_line_reads_tsv_by_extension() {
    let workspace = TestWorkspace::new();
    let tsv = workspace.write("series.tsv", "month\trevenue\nJan\t10\nFeb\t\n");
    let json = stdout_json(chartops().args([
        "shape",
        "-i",
        tsv.to_str().unwrap(),
        "--chart",
        "line",
        "-x",
        "month",
        "-y",
        "revenue",
    ]));
    assert_eq!(json[0]["revenue"], 10.0);
    assert!(json[1]["revenue"].is_null());
}

#[test]
fn suggest_resolves_selected_suggestion() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write("sales.csv", SALES);
    let suggestions = workspace.write(
        "suggestions.json",
        &format!(
            r#"[{{"recommendation":"Sales","reasoning":"","chartConfig":{{"type":"BAR_CHART","data":{{"labels":[],"datasets":[]}}}},"opsPlan":{PLAN}}}]"#
        ),
    );
    let json = stdout_json(chartops().args([
        "suggest",
        "-i",
        csv.to_str().unwrap(),
        "-s",
        suggestions.to_str().unwrap(),
    ]));
    assert_eq!(json[0]["sales"], 30.0);

    let config = stdout_json(chartops().args([
        "suggest",
        "-i",
        csv.to_str().unwrap(),
        "-s",
        suggestions.to_str().unwrap(),
        "--config",
    ]));
    assert_eq!(config["xAxisKey"], "region");
    assert_eq!(config["chartTitle"], "Sales");

    chartops()
        .args([
            "suggest",
            "-i",
            csv.to_str().unwrap(),
            "-s",
            suggestions.to_str().unwrap(),
            "--index",
            "3",
        ])
        .assert()
        .failure()
        .stderr(contains("out of range"));
}

#[test]
fn preview_limits_rows() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write("sales.csv", SALES);
    chartops()
        .args(["preview", "-i", csv.to_str().unwrap(), "--rows", "1"])
        .assert()
        .success()
        .stdout(contains("East    10"))
        .stdout(contains("West").not());
}

#[test]
fn missing_input_file_fails() {
    let workspace = TestWorkspace::new();
    let plan = workspace.write("plan.json", PLAN);
    chartops()
        .args([
            "run",
            "-i",
            workspace.path().join("absent.csv").to_str().unwrap(),
            "-p",
            plan.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("error:"));
}
