// Standalone benchmark for the streaming reader and writer
//
// Run: cargo bench --bench parse_bench
//
// Measures rows/second across:
//   - Clean data (no quoting needed)
//   - Mixed data (some fields quoted/escaped, embedded newlines)
//   - Small and large row counts

use std::time::Instant;

use csvstream::{CsvOptions, CsvReader, CsvWriter};

fn generate(rows: usize, dirty: bool) -> String {
    let options = CsvOptions {
        newline: Some("\n".to_string()),
        ..CsvOptions::default()
    };
    let mut writer = match CsvWriter::new(String::with_capacity(rows * 48), options) {
        Ok(writer) => writer,
        Err(err) => panic!("writer options rejected: {err}"),
    };
    for i in 0..rows {
        let id = i.to_string();
        let name = if dirty && i % 7 == 0 {
            format!("surname, given {i}")
        } else {
            format!("name{i}")
        };
        let note = if dirty && i % 11 == 0 {
            format!("line1\nline2 \"{i}\"")
        } else {
            format!("note {i}")
        };
        for field in [id.as_str(), name.as_str(), note.as_str()] {
            if let Err(err) = writer.write_field(field) {
                panic!("write failed: {err}");
            }
        }
        if let Err(err) = writer.next_record() {
            panic!("write failed: {err}");
        }
    }
    writer.into_inner()
}

fn parse_all(input: &str) -> usize {
    let options = CsvOptions {
        has_header: false,
        ..CsvOptions::default()
    };
    let mut reader = match CsvReader::from_reader(input.as_bytes(), options) {
        Ok(reader) => reader,
        Err(err) => panic!("reader options rejected: {err}"),
    };
    let mut fields = 0usize;
    loop {
        match reader.read_row() {
            Ok(Some(row)) => fields += row.field_count(),
            Ok(None) => break,
            Err(err) => panic!("parse failed: {err}"),
        }
    }
    fields
}

fn bench(name: &str, rows: usize, iterations: u32, f: impl Fn() -> usize) {
    // Warmup.
    let checksum = f();
    let start = Instant::now();
    for _ in 0..iterations {
        std::hint::black_box(f());
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations;
    let rows_per_sec = rows as f64 / per_iter.as_secs_f64();
    println!(
        "{name:<28} {rows:>8} rows  {per_iter:>10.3?}/iter  {rows_per_sec:>12.0} rows/s  (fields={checksum})"
    );
}

fn main() {
    env_logger::init();

    for &(rows, iterations) in &[(1_000usize, 200u32), (100_000, 10)] {
        let clean = generate(rows, false);
        let dirty = generate(rows, true);

        bench(&format!("parse clean {rows}"), rows, iterations, || {
            parse_all(&clean)
        });
        bench(&format!("parse mixed {rows}"), rows, iterations, || {
            parse_all(&dirty)
        });
        bench(&format!("write mixed {rows}"), rows, iterations, || {
            generate(rows, true).len()
        });
    }
}
