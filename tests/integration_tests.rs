// End-to-end tests: CSV input through the full analysis run to the written sheets.

use municipal_statistics::StatsError;
use municipal_statistics::analysis::{AnovaWorkflow, run_analysis, run_analysis_with};
use municipal_statistics::config::AnalysisConfig;
use municipal_statistics::data::{Dataset, GroupedSeries};
use municipal_statistics::error::DataLoadError;
use municipal_statistics::testing::correction::Correction;
use municipal_statistics::testing::inference::AnovaResult;
use municipal_statistics::testing::posthoc::{PostHocAnalyzer, TukeyHsd};
use municipal_statistics::testing::{Decision, PairwiseComparison};
use std::cell::Cell;
use std::io::Write;

const INCOME: &str = "Ingreso_Promedio_Mensual (MXN)";
const SCHOOLING: &str = "Promedio_Escolaridad (años)";
const KIND: &str = "Tipo_Municipio";

fn municipal_csv() -> String {
    let mut csv = format!("Municipio,{},{},{}\n", INCOME, SCHOOLING, KIND);
    let groups = [
        ("Rural-C", [90.0, 95.0, 100.0, 105.0, 110.0], [6.1, 7.4, 6.8, 8.2, 7.9]),
        ("Semiurbano-B", [95.0, 100.0, 105.0, 110.0, 115.0], [8.0, 9.3, 8.7, 10.1, 9.6]),
        ("Urbano-A", [290.0, 295.0, 300.0, 305.0, 310.0], [11.2, 10.4, 12.9, 11.8, 12.3]),
    ];
    let mut id = 0;
    for (kind, incomes, schooling) in groups {
        for (income, years) in incomes.iter().zip(schooling) {
            id += 1;
            csv.push_str(&format!("M{},{},{},{}\n", id, income, years, kind));
        }
    }
    csv
}

fn load(csv: &str) -> Dataset {
    let config = AnalysisConfig::default();
    Dataset::from_reader(csv.as_bytes(), &config.required_columns()).unwrap()
}

/// Counts how often it is asked to compare; returns no rows.
struct SpyAnalyzer {
    calls: Cell<usize>,
}

impl PostHocAnalyzer for SpyAnalyzer {
    fn name(&self) -> &'static str {
        "spy"
    }

    fn compare(
        &self,
        _grouped: &GroupedSeries,
        _anova: &AnovaResult,
    ) -> municipal_statistics::Result<Vec<PairwiseComparison>> {
        self.calls.set(self.calls.get() + 1);
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod data_tests {
    use super::*;

    #[test]
    fn loads_from_disk_and_drops_missing_cells() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{},{},{}", INCOME, SCHOOLING, KIND).unwrap();
        writeln!(file, "100.5,8.1,Rural-C").unwrap();
        writeln!(file, "NA,9.0,Rural-C").unwrap();
        writeln!(file, "120,,Urbano-A").unwrap();
        writeln!(file, "abc,7.5,").unwrap();
        writeln!(file, "130,10.2,Urbano-A").unwrap();
        file.flush().unwrap();

        let config = AnalysisConfig::default();
        let dataset = Dataset::load(file.path(), &config.required_columns()).unwrap();
        assert_eq!(dataset.row_count(), 5);

        let income = dataset.select(INCOME).unwrap();
        assert_eq!(income.values(), &[100.5, 120.0, 130.0]);

        let grouped = dataset.partition(INCOME, KIND).unwrap();
        assert_eq!(grouped.labels(), vec!["Rural-C", "Urbano-A"]);
        assert_eq!(grouped.get("Urbano-A").unwrap().values(), &[120.0, 130.0]);

        let (x, y) = dataset.select_paired(SCHOOLING, INCOME).unwrap();
        assert_eq!(x.values(), &[8.1, 10.2]);
        assert_eq!(y.values(), &[100.5, 130.0]);

        let obs = dataset.select_with_groups(SCHOOLING, INCOME, KIND).unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs.levels(), vec!["Rural-C", "Urbano-A"]);
    }

    #[test]
    fn missing_required_column_is_a_load_error() {
        let err = Dataset::from_reader(
            format!("{},{}\n1,2\n", INCOME, SCHOOLING).as_bytes(),
            &AnalysisConfig::default().required_columns(),
        )
        .unwrap_err();
        assert!(err.is_fatal());
        match err {
            StatsError::DataLoad(DataLoadError::MissingColumns(columns)) => {
                assert_eq!(columns, vec![KIND.to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn unreadable_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Dataset::load(&dir.path().join("absent.csv"), &[]).unwrap_err();
        assert!(matches!(err, StatsError::DataLoad(DataLoadError::Read { .. })));
    }

    #[test]
    fn all_missing_column_is_empty() {
        let dataset = load(&format!("{},{},{}\nNA,1,a\n,2,b\n", INCOME, SCHOOLING, KIND));
        assert!(matches!(
            dataset.select(INCOME),
            Err(StatsError::EmptySeries { .. })
        ));
        assert!(matches!(
            dataset.partition(INCOME, KIND),
            Err(StatsError::InsufficientGroups { required: 2, found: 0 })
        ));
    }

    #[test]
    fn a_single_label_is_not_a_partition() {
        let dataset = load(&format!("{},{},{}\n1,1,a\n2,2,a\n3,3,\n", INCOME, SCHOOLING, KIND));
        assert!(matches!(
            dataset.partition(INCOME, KIND),
            Err(StatsError::InsufficientGroups { required: 2, found: 1 })
        ));
    }
}

#[cfg(test)]
mod workflow_tests {
    use super::*;

    fn flat_groups() -> GroupedSeries {
        GroupedSeries::from_groups(
            INCOME,
            KIND,
            vec![("a", vec![1.0, 2.0, 3.0]), ("b", vec![3.0, 1.0, 2.0])],
        )
        .unwrap()
    }

    fn separated_groups() -> GroupedSeries {
        GroupedSeries::from_groups(
            INCOME,
            KIND,
            vec![
                ("a", vec![1.0, 2.0, 3.0]),
                ("b", vec![101.0, 102.0, 103.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn posthoc_is_skipped_when_omnibus_fails_to_reject() {
        let spy = SpyAnalyzer { calls: Cell::new(0) };
        let workflow = AnovaWorkflow::run(&flat_groups(), 0.05, &spy).unwrap();

        assert_eq!(spy.calls.get(), 0);
        assert!(matches!(workflow, AnovaWorkflow::OmnibusDone { .. }));
        assert_eq!(
            workflow.anova().unwrap().result.decision,
            Decision::FailToReject
        );
        assert!(workflow.comparisons().is_none());
    }

    #[test]
    fn posthoc_runs_once_after_rejection() {
        let spy = SpyAnalyzer { calls: Cell::new(0) };
        let workflow = AnovaWorkflow::run(&separated_groups(), 0.05, &spy).unwrap();

        assert_eq!(spy.calls.get(), 1);
        assert_eq!(workflow.state_name(), "post-hoc done");
        assert_eq!(workflow.comparisons().unwrap().len(), 0);

        // a finished workflow does not call the analyzer again
        let workflow = workflow.run_posthoc(&separated_groups(), &spy).unwrap();
        assert_eq!(spy.calls.get(), 1);
        assert!(matches!(workflow, AnovaWorkflow::PosthocDone { .. }));
    }

    #[test]
    fn posthoc_failure_keeps_the_omnibus_result() {
        // one within-group degree of freedom: the ANOVA rejects but Tukey HSD needs df >= 2
        let grouped = GroupedSeries::from_groups(
            INCOME,
            KIND,
            vec![("a", vec![1.0, 2.0]), ("b", vec![100.0])],
        )
        .unwrap();
        let workflow = AnovaWorkflow::run(&grouped, 0.05, &TukeyHsd::new(0.05)).unwrap();

        assert_eq!(workflow.state_name(), "post-hoc failed");
        let anova = workflow.anova().unwrap();
        assert_eq!(anova.result.decision, Decision::RejectNull);
        assert_eq!(anova.table.df_within, 1);
        assert!(matches!(
            workflow.posthoc_error(),
            Some(StatsError::InvalidParameter(_))
        ));
        assert!(workflow.comparisons().is_none());

        // the failed state is terminal
        let spy = SpyAnalyzer { calls: Cell::new(0) };
        let workflow = workflow.run_posthoc(&grouped, &spy).unwrap();
        assert_eq!(spy.calls.get(), 0);
        assert!(matches!(workflow, AnovaWorkflow::PosthocFailed { .. }));
    }

    #[test]
    fn transitions_out_of_order_are_rejected() {
        let spy = SpyAnalyzer { calls: Cell::new(0) };
        assert!(matches!(
            AnovaWorkflow::new().run_posthoc(&separated_groups(), &spy),
            Err(StatsError::InvalidParameter(_))
        ));
        let done = AnovaWorkflow::new()
            .run_omnibus(&separated_groups(), 0.05)
            .unwrap();
        assert!(done.run_omnibus(&separated_groups(), 0.05).is_err());
        assert_eq!(spy.calls.get(), 0);
    }

    #[test]
    fn full_run_never_calls_posthoc_without_rejection() {
        let mut csv = format!("{},{},{}\n", INCOME, SCHOOLING, KIND);
        for (income, years, kind) in [
            (10.0, 6.0, "x"),
            (12.0, 7.5, "x"),
            (11.0, 8.0, "x"),
            (11.0, 6.5, "y"),
            (10.0, 9.0, "y"),
            (12.0, 7.0, "y"),
        ] {
            csv.push_str(&format!("{},{},{}\n", income, years, kind));
        }
        let spy = SpyAnalyzer { calls: Cell::new(0) };
        let report = run_analysis_with(&load(&csv), &AnalysisConfig::default(), &spy).unwrap();
        assert_eq!(spy.calls.get(), 0);
        assert_eq!(
            report.anova_result().unwrap().result.decision,
            Decision::FailToReject
        );
    }
}

#[cfg(test)]
mod end_to_end_tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use municipal_statistics::report::{
        group_statistics_sheet, pairwise_f_test_sheet, posthoc_sheet, render_text, sheets,
        write_json, write_sheets,
    };

    #[test]
    fn three_municipality_types() {
        let dataset = load(&municipal_csv());
        let report = run_analysis(&dataset, &AnalysisConfig::default()).unwrap();
        assert_eq!(report.row_count, 15);

        let groups = report.group_descriptives.as_ref().unwrap();
        assert_abs_diff_eq!(groups["Rural-C"].summary.mean, 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(groups["Semiurbano-B"].summary.mean, 105.0, epsilon = 1e-9);
        assert_abs_diff_eq!(groups["Urbano-A"].summary.mean, 300.0, epsilon = 1e-9);

        let anova = report.anova_result().unwrap();
        assert_eq!(anova.result.decision, Decision::RejectNull);

        let workflow = report.anova.as_ref().unwrap();
        let rows = workflow.comparisons().unwrap();
        let verdict: Vec<(&str, &str, bool)> = rows
            .iter()
            .map(|c| (c.group_a.as_str(), c.group_b.as_str(), c.significant))
            .collect();
        assert_eq!(
            verdict,
            vec![
                ("Rural-C", "Semiurbano-B", false),
                ("Rural-C", "Urbano-A", true),
                ("Semiurbano-B", "Urbano-A", true),
            ]
        );

        // equal spreads in every group: no variance ratio differs
        let ratios = report.variance_ratios.as_ref().unwrap();
        assert_eq!(ratios.len(), 3);
        assert!(ratios.iter().all(|r| !r.significant));

        assert!(report.regression.is_ok());
        let correlation = report.correlation.as_ref().unwrap();
        assert!(correlation.correlation.r > 0.8);
        assert_abs_diff_eq!(
            correlation.result.metadata["slope"],
            correlation.correlation.slope,
            epsilon = 1e-12
        );
        assert!(correlation.result.metadata.contains_key("intercept"));
        assert!(report.runs.is_ok());
    }

    #[test]
    fn failed_sections_are_reported_as_not_applicable() {
        // a single municipality type: no group comparisons are possible
        let mut csv = format!("{},{},{}\n", INCOME, SCHOOLING, KIND);
        for (income, years) in [(10.0, 6.0), (12.0, 7.5), (11.0, 8.0), (15.0, 9.0)] {
            csv.push_str(&format!("{},{},Rural-C\n", income, years));
        }
        let report = run_analysis(&load(&csv), &AnalysisConfig::default()).unwrap();

        assert!(report.value_summary.is_ok());
        assert!(matches!(
            report.anova,
            Err(StatsError::InsufficientGroups { required: 2, found: 1 })
        ));
        assert!(report.regression.is_err());

        let failed: Vec<&str> = report.not_applicable().iter().map(|(name, _)| *name).collect();
        assert!(failed.contains(&"anova"));
        assert!(failed.contains(&"variance ratios"));

        let text = render_text(&report);
        assert!(text.contains("not applicable: need at least 2 groups, found 1"));
        assert!(group_statistics_sheet(&report).is_none());
        assert!(posthoc_sheet(&report).is_none());
    }

    #[test]
    fn singleton_group_makes_group_sections_degenerate() {
        let mut csv = format!("{},{},{}\n", INCOME, SCHOOLING, KIND);
        for (income, years, kind) in [
            (10.0, 6.0, "x"),
            (12.0, 7.5, "x"),
            (11.0, 8.0, "x"),
            (30.0, 9.0, "y"),
        ] {
            csv.push_str(&format!("{},{},{}\n", income, years, kind));
        }
        let report = run_analysis(&load(&csv), &AnalysisConfig::default()).unwrap();
        assert!(matches!(
            report.group_descriptives,
            Err(StatsError::DegenerateSample { count: 1 })
        ));
        assert!(matches!(
            report.variance_ratios,
            Err(StatsError::DegenerateSample { count: 1 })
        ));
    }

    #[test]
    fn anova_survives_a_failed_posthoc_step() {
        let mut csv = format!("{},{},{}\n", INCOME, SCHOOLING, KIND);
        for (income, years, kind) in [(10.0, 6.0, "x"), (12.0, 7.5, "x"), (300.0, 9.0, "y")] {
            csv.push_str(&format!("{},{},{}\n", income, years, kind));
        }
        let report = run_analysis(&load(&csv), &AnalysisConfig::default()).unwrap();

        let anova = report.anova_result().unwrap();
        assert_eq!(anova.result.decision, Decision::RejectNull);
        let failed: Vec<&str> = report.not_applicable().iter().map(|(name, _)| *name).collect();
        assert!(failed.contains(&"post-hoc"));
        assert!(!failed.contains(&"anova"));
        assert!(posthoc_sheet(&report).is_none());

        let text = render_text(&report);
        assert!(text.contains("=== Tukey HSD ===\nnot applicable: invalid parameter"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["anova"]["state"], "posthoc_failed");
        assert!(json["anova"]["error"].as_str().unwrap().contains("df >= 2"));
        assert_eq!(json["anova"]["anova"]["table"]["df_within"], 1);
    }

    #[test]
    fn text_report_and_written_sheets() {
        let dataset = load(&municipal_csv());
        let config = AnalysisConfig::default().with_alpha(0.01);
        let report = run_analysis(&dataset, &config).unwrap();

        let text = render_text(&report);
        assert!(text.contains("One-way ANOVA"));
        assert!(text.contains("Tukey HSD"));
        assert!(text.contains("at least one group mean differs from the others"));

        let f_sheet = pairwise_f_test_sheet(&report).unwrap();
        assert_eq!(f_sheet.rows.len(), 3);
        assert_eq!(f_sheet.headers[0], "group_a");

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("sheets");
        write_sheets(&out, &sheets(&report)).unwrap();
        for name in ["group_statistics", "pairwise_f_tests", "posthoc"] {
            let path = out.join(format!("{}.csv", name));
            let contents = std::fs::read_to_string(&path).unwrap();
            assert_eq!(contents.lines().count(), 4, "{}", name);
        }

        let json_path = dir.path().join("report.json");
        write_json(&json_path, &report).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(json["anova"]["state"], "posthoc_done");
        assert_eq!(json["config"]["alpha"], 0.01);
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config = AnalysisConfig::from_toml_str("alpha = 0.1\ncorrection = \"bonferroni\"\n")
            .unwrap();
        assert_eq!(config.alpha, 0.1);
        assert_eq!(config.correction, Correction::Bonferroni);
        assert_eq!(config.value_column, INCOME);
        assert_eq!(config.group_column, KIND);
    }

    #[test]
    fn reads_a_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "value_column = \"income\"").unwrap();
        writeln!(file, "group_column = \"kind\"").unwrap();
        file.flush().unwrap();

        let config = AnalysisConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.value_column, "income");
        assert_eq!(config.required_columns(), vec!["income", SCHOOLING, "kind"]);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(AnalysisConfig::from_toml_str("alpha = 1.5").is_err());
        assert!(AnalysisConfig::from_toml_str("group_column = \"\"").is_err());
        assert!(
            AnalysisConfig::from_toml_str(&format!("group_column = \"{}\"", INCOME)).is_err()
        );
        assert!(AnalysisConfig::from_toml_str("alpha = \"high\"").is_err());
    }

    #[test]
    fn tukey_uses_configured_alpha() {
        let config = AnalysisConfig::default().with_alpha(0.01);
        assert_eq!(TukeyHsd::new(config.alpha).alpha, 0.01);
    }
}
