// End-to-end: fixture CSVs on disk → Pipeline → merged rows, analysis, files

use police_analysis::{
    AnalysisReport, ChartOutcome, Indicator, Pipeline, PipelineConfig, PipelineError, Value,
    ENCODED_MANNER_COLUMN,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Five small sources in the same shape as the published datasets
fn fixture() -> (TempDir, PipelineConfig) {
    let dir = tempfile::tempdir().unwrap();
    let d = dir.path();

    let mut config = PipelineConfig::default();
    config.sources.fatalities = write(
        d,
        "Deaths_by_Police_US.csv",
        b"id,name,date,manner_of_death,armed,age,gender,race,city,state\n\
          3,Tim Elliot,02/01/15,shot,gun,53,M,A,Shelton,WA\n\
          4,Lewis Lee Lembke,02/01/15,shot,gun,47,M,W,Aloha,OR\n\
          5,John Paul Quintero,03/01/15,shot and Tasered,unarmed,23,M,H,Wichita,KS\n\
          8,Matthew Hoffman,04/01/15,shot,toy weapon,32,M,W,San Francisco,CA\n\
          9,Michael Rodriguez,04/01/15,,nail gun,39,M,H,Evans,CO\n\
          11,Kenneth Joe Brown,04/01/15,shot,gun,18,M,W,Guthrie,OK\n\
          12,Wichita Repeat,05/01/15,shot,gun,30,M,W,Wichita city,KS\n\
          13,Ca\xf1on Person,06/01/15,shot,gun,41,M,W,Ca\xf1on City,CO\n",
    );
    config.sources.income = write(
        d,
        "Median_Household_Income_2015.csv",
        b"Geographic Area,City,Median Income\n\
          WA,Shelton city,37072\n\
          OR,Aloha CDP,65765\n\
          KS,Wichita city,45947\n\
          CA,San Francisco city,81294\n\
          CO,Evans city,52000\n\
          OK,Guthrie city,(X)\n\
          CO,Ca\xf1on City city,34000\n",
    );
    config.sources.high_school = write(
        d,
        "Pct_Over_25_Completed_High_School.csv",
        b"Geographic Area,City,percent_completed_hs\n\
          WA,Shelton city,80.1\n\
          KS,Wichita city,87.5\n\
          CA,San Francisco city,87.7\n\
          OK,Guthrie city,-\n",
    );
    config.sources.poverty = write(
        d,
        "Pct_People_Below_Poverty_Level.csv",
        b"Geographic Area,City,poverty_rate\n\
          WA,Shelton city,28.6\n\
          KS,Wichita city,19.1\n\
          KS,Wichita town,99\n\
          CA,San Francisco city,13.2\n\
          CO,Evans city,17\n",
    );
    config.sources.race = write(
        d,
        "Share_of_Race_By_City.csv",
        b"Geographic area,City,share_white,share_black,share_native_american,share_asian,share_hispanic\n\
          WA,Shelton city,78.9,0.8,3.7,1.1,19.2\n\
          KS,Wichita city,71.9,11.5,1.2,\"4,8\",15.3\n\
          CA,San Francisco city,48.5,6.1,0.5,33.3,15.1\n\
          CO,Evans city,70.0,1.0,1.0,(X),N/A\n",
    );
    config.output.dir = d.join("plots");
    config.output.city_summary_limit = 5;

    (dir, config)
}

#[test]
fn test_merge_keeps_one_row_per_fatality_city() {
    let (_dir, config) = fixture();
    let output = Pipeline::new(config).analyze().unwrap();

    // "Wichita" and "Wichita city" collapse to one key; first row wins
    assert_eq!(output.records.len(), 7);
    let wichita: Vec<_> = output.records.iter().filter(|r| r.city == "wichita").collect();
    assert_eq!(wichita.len(), 1);
    assert_eq!(wichita[0].id.as_deref(), Some("5"));
    assert!(output.merge_stats.duplicate_cities.is_empty());
    assert_eq!(output.merge_stats.rows_after_join, vec![7, 7, 7, 7]);
}

#[test]
fn test_indicators_are_joined_and_coerced() {
    let (_dir, config) = fixture();
    let output = Pipeline::new(config).analyze().unwrap();
    let find = |city: &str| output.records.iter().find(|r| r.city == city).unwrap();

    let shelton = find("shelton");
    assert_eq!(shelton.median_income, Value::Number(37072.0));
    assert_eq!(shelton.high_school_completion, Value::Number(80.1));
    assert_eq!(shelton.asian_share, Value::Number(1.1));

    // Thousands separator stripped from a quoted share
    assert_eq!(find("wichita").asian_share, Value::Number(48.0));
    assert_eq!(find("wichita").poverty_rate, Value::Number(19.1));

    // Unparseable shares stay in the output as missing
    let evans = find("evans");
    assert_eq!(evans.asian_share, Value::Missing);
    assert_eq!(evans.hispanic_share, Value::Missing);
    assert_eq!(evans.manner_of_death, "Unknown");

    // "(X)" income coerces to missing in the aggregation pass
    assert_eq!(find("guthrie").median_income, Value::Missing);

    // No indicator table has Aloha under that key ("aloha cdp")
    assert!(find("aloha").is_unenriched());

    // Latin-1 city names survive and join
    assert_eq!(find("cañon").median_income, Value::Number(34000.0));
}

#[test]
fn test_analysis_outputs() {
    let (_dir, config) = fixture();
    let output = Pipeline::new(config).analyze().unwrap();
    let analysis = &output.analysis;

    assert_eq!(analysis.encoding.classes, vec!["Unknown", "shot", "shot and Tasered"]);
    assert_eq!(analysis.income_fatalities.len(), 7);

    let corr = &analysis.correlation;
    assert_eq!(corr.columns.len(), 9);
    assert_eq!(corr.get("median_income", "median_income"), Some(1.0));
    assert_eq!(corr.get(ENCODED_MANNER_COLUMN, ENCODED_MANNER_COLUMN), Some(1.0));
    for row in &corr.values {
        for v in row.iter().flatten() {
            assert!((-1.0..=1.0).contains(v));
        }
    }

    // Every merged city appears once, ordered by key
    let cities: Vec<&str> = analysis.city_summary.iter().map(|c| c.city.as_str()).collect();
    let mut sorted = cities.clone();
    sorted.sort();
    assert_eq!(cities, sorted);
    assert_eq!(cities.len(), 7);

    let sf = analysis.city_summary.iter().find(|c| c.city == "san francisco").unwrap();
    assert_eq!(sf.total_encoded_fatalities, 1);
    assert_eq!(sf.mean(Indicator::MedianIncome), Some(81294.0));
}

#[test]
fn test_run_writes_charts_and_report() {
    let (_dir, config) = fixture();
    let out_dir = config.output.dir.clone();

    let (_, rendered) = Pipeline::new(config).run().unwrap();

    assert!(rendered
        .charts
        .iter()
        .all(|c| matches!(c, ChartOutcome::Written(_))));
    for name in [
        "correlation_matrix.svg",
        "income_vs_fatalities.svg",
        "citywise_median_income.svg",
        "analysis.json",
        "merged.csv",
        "city_summary.csv",
    ] {
        assert!(out_dir.join(name).exists(), "missing {}", name);
    }

    let report = AnalysisReport::read_json(&out_dir.join("analysis.json")).unwrap();
    assert_eq!(report.analysis.city_summary.len(), 5);
    assert_eq!(report.merge.final_rows, 7);
    assert_eq!(report.metadata.input_fingerprint.len(), 64);
}

#[test]
fn test_missing_source_is_fatal() {
    let (_dir, mut config) = fixture();
    config.sources.poverty = config.sources.poverty.with_file_name("nope.csv");

    let err = Pipeline::new(config).analyze().unwrap_err();

    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::SourceRead { .. })
    ));
}

#[test]
fn test_reruns_are_identical() {
    let (_dir, config) = fixture();
    let pipeline = Pipeline::new(config);

    let a = pipeline.analyze().unwrap();
    let b = pipeline.analyze().unwrap();

    assert_eq!(a.records, b.records);
    assert_eq!(a.analysis, b.analysis);
}
