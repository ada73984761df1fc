use serde::Serialize;
use serde_json::Value;
use std::io::{self, Write};

#[derive(clap::Args, Clone, Debug, Default)]
pub struct Output {
    /// How to format CLI output
    #[clap(global = true, short, long, value_enum)]
    pub output: Option<OutputType>,
}

#[derive(clap::ValueEnum, Debug, Copy, Clone, PartialEq)]
pub enum OutputType {
    /// Format output as compact JSON with items separated by newlines
    Json,
    /// Format output as YAML
    Yaml,
    /// Format the output as a pretty-printed table
    Table,
}

/// Things printed by listing commands, as JSON, YAML, or a table row.
/// JSON and YAML come from `Serialize`, so the trait is only about tables.
pub trait CliOutput: Serialize {
    /// Alternate table layout, such as the expanded keys of `users list --expand-key`.
    /// Use `()` when there is only one layout.
    type TableAlt: Copy;
    /// Cell type of `into_table_row`, typically `String` or `JsonCell`.
    type CellValue: Into<comfy_table::Cell>;

    fn table_headers(alt: Self::TableAlt) -> Vec<&'static str>;

    /// Cells of this item, in the order of `table_headers`.
    fn into_table_row(self, alt: Self::TableAlt) -> Vec<Self::CellValue>;
}

pub fn print_yaml(items: impl IntoIterator<Item = impl CliOutput>) -> anyhow::Result<()> {
    write_yaml(&mut io::stdout().lock(), items)
}

pub fn print_json(items: impl IntoIterator<Item = impl CliOutput>) -> anyhow::Result<()> {
    write_json(&mut io::stdout().lock(), items)
}

pub fn print_table<T: CliOutput>(
    alt: T::TableAlt,
    items: impl IntoIterator<Item = T>,
) -> anyhow::Result<()> {
    write_table(&mut io::stdout().lock(), alt, items)
}

fn write_yaml<W: Write>(
    w: &mut W,
    items: impl IntoIterator<Item = impl CliOutput>,
) -> anyhow::Result<()> {
    for item in items {
        serde_yaml::to_writer(&mut *w, &item)?;
        w.write_all(b"\n")?;
    }
    Ok(())
}

fn write_json<W: Write>(
    w: &mut W,
    items: impl IntoIterator<Item = impl CliOutput>,
) -> anyhow::Result<()> {
    for item in items {
        serde_json::to_writer(&mut *w, &item)?;
        w.write_all(b"\n")?;
    }
    Ok(())
}

fn write_table<W: Write, T: CliOutput>(
    w: &mut W,
    alt: T::TableAlt,
    items: impl IntoIterator<Item = T>,
) -> anyhow::Result<()> {
    let mut table = new_table(T::table_headers(alt));

    for item in items {
        table.add_row(item.into_table_row(alt));
    }

    for line in table.lines() {
        w.write_all(line.as_bytes())?;
        w.write_all(b"\n")?;
    }
    Ok(())
}

// new_table builds a comfy_table with UTF8 styling.
pub fn new_table(headers: Vec<&str>) -> comfy_table::Table {
    let mut table = comfy_table::Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .apply_modifier(comfy_table::modifiers::UTF8_SOLID_INNER_BORDERS);

    table.set_header(headers);
    table
}

/// Extracts the values at JSON `pointers` of a serialized item as a table row.
/// Often used to implement `CliOutput::into_table_row`.
pub fn to_table_row<T: Serialize>(value: T, pointers: &[&str]) -> Vec<JsonCell> {
    let mut json = serde_json::to_value(value).expect("failed to serialize json");

    pointers
        .iter()
        .map(|column| JsonCell(json.pointer_mut(column).map(Value::take)))
        .collect()
}

/// A wrapper around an `Option<Value>` to allow it to be converted into a table cell.
/// Arrays of strings are rendered one element per line.
pub struct JsonCell(pub Option<Value>);

impl From<JsonCell> for comfy_table::Cell {
    fn from(cell: JsonCell) -> Self {
        match cell.0 {
            None | Some(Value::Null) => comfy_table::Cell::new(String::new()),
            Some(Value::String(s)) => comfy_table::Cell::new(s),
            Some(Value::Array(items)) if items.iter().all(Value::is_string) => {
                comfy_table::Cell::new(
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join("\n"),
                )
            }
            Some(other) => comfy_table::Cell::new(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        key: String,
        name: String,
        tags: Vec<String>,
    }

    impl CliOutput for Row {
        type TableAlt = ();
        type CellValue = JsonCell;

        fn table_headers(_alt: Self::TableAlt) -> Vec<&'static str> {
            vec!["Key", "Name", "Tags"]
        }

        fn into_table_row(self, _alt: Self::TableAlt) -> Vec<Self::CellValue> {
            to_table_row(self, &["/key", "/name", "/tags", "/missing"])
                .into_iter()
                .take(3)
                .collect()
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                key: "prod".to_string(),
                name: "Production".to_string(),
                tags: vec!["a".to_string(), "b".to_string()],
            },
            Row {
                key: "dev".to_string(),
                name: "Development".to_string(),
                tags: vec![],
            },
        ]
    }

    #[test]
    fn json_output_is_one_document_per_line() {
        let mut out = Vec::new();
        write_json(&mut out, rows()).unwrap();
        let out = String::from_utf8(out).unwrap();

        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r#"{"key":"prod","name":"Production","tags":["a","b"]}"#
        );
    }

    #[test]
    fn table_output_has_headers_and_cells() {
        let mut out = Vec::new();
        write_table(&mut out, (), rows()).unwrap();
        let out = String::from_utf8(out).unwrap();

        for needle in ["Key", "Name", "Tags", "prod", "Production", "Development"] {
            assert!(out.contains(needle), "missing {needle} in:\n{out}");
        }
    }

    #[test]
    fn missing_pointers_become_empty_cells() {
        let cells = to_table_row(rows().remove(0), &["/key", "/missing"]);
        assert!(matches!(&cells[0].0, Some(Value::String(s)) if s == "prod"));
        assert!(cells[1].0.is_none());
    }
}
