use proptest::prelude::*;

use winget_batch::model::types::UNKNOWN;
use winget_batch::parse::parse_table;
use winget_batch::winget::ProcessOutput;

fn aligned(rows: &[(String, String, String)]) -> Vec<String> {
    let line = |name: &str, id: &str, version: &str| format!("{name:<26}{id:<30}{version:<12}winget");
    let mut lines = vec![
        format!("{:<26}{:<30}{:<12}Source", "Name", "Id", "Version"),
        "-".repeat(74),
    ];
    lines.extend(rows.iter().map(|(n, i, v)| line(n, i, v)));
    lines
}

fn row_strategy() -> impl Strategy<Value = (String, String, String)> {
    (
        "[A-Z][a-z]{2,8}( [A-Z][a-z]{2,8})?",
        "[A-Z][a-z]{1,8}\\.[A-Z][a-z]{1,10}",
        "[0-9]{1,2}\\.[0-9]{1,2}(\\.[0-9]{1,3})?",
    )
}

proptest! {
    #[test]
    fn one_record_per_unique_valid_row(rows in prop::collection::vec(row_strategy(), 0..25)) {
        let records = parse_table(aligned(&rows), "");

        let mut seen = std::collections::HashSet::new();
        let expected: Vec<&(String, String, String)> =
            rows.iter().filter(|(_, id, _)| seen.insert(id.clone())).collect();

        prop_assert_eq!(records.len(), expected.len());
        for (record, (name, id, version)) in records.iter().zip(expected) {
            prop_assert_eq!(&record.name, name);
            prop_assert_eq!(&record.id, id);
            prop_assert_eq!(&record.version, version);
            prop_assert_eq!(record.source.as_str(), "winget");
        }
    }

    #[test]
    fn parsing_arbitrary_text_never_panics(lines in prop::collection::vec(".{0,120}", 0..30)) {
        let _ = parse_table(&lines, "any query");
    }
}

#[test]
fn scenario_misaligned_row_is_recovered() {
    let lines = [
        "Name    Id    Version",
        "----------------",
        "Foo Bar    Foo.Bar    1.2.3",
    ];
    let records = parse_table(lines, "Foo");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "Foo Bar");
    assert_eq!(records[0].id, "Foo.Bar");
    assert_eq!(records[0].version, "1.2.3");
    assert_eq!(records[0].source, UNKNOWN);
    assert_eq!(records[0].search_term, "Foo");
}

#[test]
fn spinner_residue_before_header_is_cleaned() {
    let raw = "   - \r   \\ \r   | \rName           Id              Version  Source\n\
               ------------------------------------------------------\n\
               Power Toys     Microsoft.PowerToys  0.76.0   winget\n";
    let output = ProcessOutput::from_stdout(0, raw);
    let records = parse_table(output.all_lines(), "power");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "Microsoft.PowerToys");
}

#[test]
fn multi_word_query_filters_rows() {
    let rows = vec![
        ("Visual Studio Code".to_string(), "Microsoft.VSCode".to_string(), "1.85".to_string()),
        ("Visual Studio".to_string(), "Microsoft.VisualStudio".to_string(), "17.8".to_string()),
    ];
    let records = parse_table(aligned(&rows), "visual code");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "Microsoft.VSCode");
}
