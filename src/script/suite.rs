use super::tree::build_case_paths;
use super::{TestCase, TestSuite};
use crate::error::AppError;
use crate::workbook::CellSource;

/// Name of the sheet listing test cases.
pub const INDEX_SHEET: &str = "Index";

/// Build the test suite from the `Index` sheet and the case sheets it names.
///
/// Index rows need both a sheet name (A) and a description (B). Cases whose
/// sheet is missing or malformed are dropped with a warning; the rest of the
/// suite still loads.
pub fn load_suite(source: &dyn CellSource) -> Result<TestSuite, AppError> {
    if !source.has_sheet(INDEX_SHEET) {
        return Err(AppError::Workbook(format!(
            "workbook has no '{}' sheet",
            INDEX_SHEET
        )));
    }

    let mut suite = TestSuite::default();

    for row in source.row_numbers(INDEX_SHEET) {
        if row == 1 {
            continue;
        }
        let sheet_name = source.cell_value(INDEX_SHEET, &format!("A{}", row));
        let description = source.cell_value(INDEX_SHEET, &format!("B{}", row));
        if sheet_name.is_empty() || description.is_empty() {
            continue;
        }

        match build_case_paths(source, &sheet_name) {
            Ok(steps) => {
                tracing::info!(case = %sheet_name, paths = steps.len(), "Loaded test case");
                suite.test_cases.push(TestCase {
                    sheet_name,
                    description,
                    steps,
                });
            }
            Err(e) => {
                tracing::warn!(case = %sheet_name, "Dropping test case: {}", e);
            }
        }
    }

    Ok(suite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::Workbook;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        wb.add_sheet_rows(
            INDEX_SHEET,
            vec![
                row(&["SheetName", "Description"]),
                row(&["Greeting", "Says hello"]),
                row(&["Missing", "Sheet does not exist"]),
                row(&["NoDescription", ""]),
                row(&["Broken", "Bad step number"]),
                row(&["Weather", "Asks the weather"]),
            ],
        );
        wb.add_sheet_rows(
            "Greeting",
            vec![
                row(&["Step", "Input", "Expected", "Entities"]),
                row(&["1", "hi", "hello"]),
                row(&["", "hey", "hello"]),
            ],
        );
        wb.add_sheet_rows(
            "NoDescription",
            vec![row(&["Step"]), row(&["1", "hi", "hello"])],
        );
        wb.add_sheet_rows(
            "Broken",
            vec![row(&["Step"]), row(&["first", "hi", "hello"])],
        );
        wb.add_sheet_rows(
            "Weather",
            vec![
                row(&["Step", "Input", "Expected", "Entities"]),
                row(&["1", "weather in Seattle", "sunny in ${1-3}", "{3,Seattle}"]),
            ],
        );
        wb
    }

    #[test]
    fn test_loads_valid_cases_in_index_order() {
        let suite = load_suite(&workbook()).unwrap();
        let names: Vec<&str> = suite
            .test_cases
            .iter()
            .map(|c| c.sheet_name.as_str())
            .collect();
        assert_eq!(names, vec!["Greeting", "Weather"]);
        assert_eq!(suite.test_cases[0].description, "Says hello");
        assert_eq!(suite.test_cases[0].steps.len(), 2);
        assert_eq!(suite.path_count(), 3);
    }

    #[test]
    fn test_missing_index_sheet_is_an_error() {
        let mut wb = Workbook::new();
        wb.add_sheet_rows("Greeting", vec![row(&["Step"])]);
        let err = load_suite(&wb).unwrap_err();
        assert_eq!(err.kind(), "workbook");
    }
}
