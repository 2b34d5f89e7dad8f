// Result tables: flows, graph edges, transfer matrix, solver input

use std::fs::File;
use std::io::Write;
use std::path::Path;

use voteflow_pipeline::solver::DataTable;
use voteflow_pipeline::{FlowEdge, FlowGraph, TransferMatrix};

pub const FLOWS_HEADER: [&str; 4] = ["Origin", "Destination", "Probability", "Estimated_Units"];
pub const EDGES_HEADER: [&str; 3] = ["source", "target", "value"];

fn create(path: &Path) -> Result<File, String> {
    File::create(path).map_err(|e| format!("cannot write {}: {e}", path.display()))
}

/// One row per origin/destination pair with a non-zero flow.
pub fn write_flows<W: Write>(out: W, flows: &[FlowEdge]) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(FLOWS_HEADER).map_err(|e| e.to_string())?;
    for flow in flows {
        let probability = flow.probability.to_string();
        let units = flow.estimated_units.to_string();
        writer
            .write_record([
                flow.origin_category.as_str(),
                flow.destination_category.as_str(),
                probability.as_str(),
                units.as_str(),
            ])
            .map_err(|e| e.to_string())?;
    }
    writer.flush().map_err(|e| e.to_string())
}

/// Graph edges with side-labelled node names.
pub fn write_edges<W: Write>(out: W, graph: &FlowGraph) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(EDGES_HEADER).map_err(|e| e.to_string())?;
    for edge in &graph.edges {
        let value = edge.value.to_string();
        writer
            .write_record([edge.source.as_str(), edge.target.as_str(), value.as_str()])
            .map_err(|e| e.to_string())?;
    }
    writer.flush().map_err(|e| e.to_string())
}

/// Header `origin,<dest1>,...`, then one row per origin category.
pub fn write_matrix<W: Write>(
    out: W,
    matrix: &TransferMatrix,
    origin_categories: &[String],
    destination_categories: &[String],
) -> Result<(), String> {
    if matrix.rows() != origin_categories.len() || matrix.cols() != destination_categories.len() {
        return Err(format!(
            "matrix is {}×{} but {} origin and {} destination labels were given",
            matrix.rows(),
            matrix.cols(),
            origin_categories.len(),
            destination_categories.len()
        ));
    }

    let mut writer = csv::Writer::from_writer(out);
    let mut header = Vec::with_capacity(destination_categories.len() + 1);
    header.push("origin".to_string());
    header.extend(destination_categories.iter().cloned());
    writer.write_record(&header).map_err(|e| e.to_string())?;

    for (r, origin) in origin_categories.iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(origin.clone());
        record.extend(matrix.row(r).iter().map(|v| v.to_string()));
        writer.write_record(&record).map_err(|e| e.to_string())?;
    }
    writer.flush().map_err(|e| e.to_string())
}

/// Solver input table, columns in `n, x1.., t1..` order.
pub fn write_data_table<W: Write>(out: W, table: &DataTable) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(table.names()).map_err(|e| e.to_string())?;
    for i in 0..table.row_count() {
        let record: Vec<String> = table
            .columns()
            .iter()
            .map(|(_, values)| values[i].to_string())
            .collect();
        writer.write_record(&record).map_err(|e| e.to_string())?;
    }
    writer.flush().map_err(|e| e.to_string())
}

pub fn write_flows_csv(path: &Path, flows: &[FlowEdge]) -> Result<(), String> {
    write_flows(create(path)?, flows)
}

pub fn write_edges_csv(path: &Path, graph: &FlowGraph) -> Result<(), String> {
    write_edges(create(path)?, graph)
}

pub fn write_matrix_csv(
    path: &Path,
    matrix: &TransferMatrix,
    origin_categories: &[String],
    destination_categories: &[String],
) -> Result<(), String> {
    write_matrix(create(path)?, matrix, origin_categories, destination_categories)
}

pub fn write_data_table_csv(path: &Path, table: &DataTable) -> Result<(), String> {
    write_data_table(create(path)?, table)
}
