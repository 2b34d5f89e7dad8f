use serde::Serialize;

use crate::error::PipelineError;
use crate::model::TransferMatrix;
use crate::solver::SolverOutput;

/// How the solver laid out its flat output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputShape {
    /// One P×Q matrix, column-major.
    Averaged,
    /// `units` column-major P×Q matrices stacked back to back.
    PerUnit { units: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    pub matrix: TransferMatrix,
    pub shape: OutputShape,
}

/// Decide the layout from the vector length alone.
pub fn classify_shape(len: usize, rows: usize, cols: usize) -> Result<OutputShape, PipelineError> {
    let cells = rows * cols;
    if cells == 0 || len == 0 || len % cells != 0 {
        return Err(PipelineError::MatrixShape { len, rows, cols });
    }
    match len / cells {
        1 => Ok(OutputShape::Averaged),
        units => Ok(OutputShape::PerUnit { units }),
    }
}

/// Fold a flat coefficient vector into a `rows`×`cols` matrix.
///
/// Entry `(row, col)` of a column-major block sits at `col * rows + row`.
/// Per-unit output is averaged element-wise across the blocks.
pub fn reconstruct(values: &[f64], rows: usize, cols: usize) -> Result<Reconstruction, PipelineError> {
    let shape = classify_shape(values.len(), rows, cols)?;
    let mut matrix = TransferMatrix::zeros(rows, cols);

    match shape {
        OutputShape::Averaged => {
            for col in 0..cols {
                for row in 0..rows {
                    matrix.set(row, col, values[col * rows + row]);
                }
            }
        }
        OutputShape::PerUnit { units } => {
            let cells = rows * cols;
            let k = units as f64;
            for (i, value) in values.iter().enumerate() {
                let param = i % cells;
                let col = param / rows;
                let row = param % rows;
                matrix.add(row, col, value / k);
            }
        }
    }

    log::debug!("reconstructed {rows}×{cols} transfer matrix from {} values ({shape:?})", values.len());

    Ok(Reconstruction { matrix, shape })
}

pub fn reconstruct_output(output: &SolverOutput) -> Result<Reconstruction, PipelineError> {
    reconstruct(&output.values, output.rows, output.cols)
}
