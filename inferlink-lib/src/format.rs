//! Prediction rendering for standard output.
//!
//! The header line and row shape depend on the device-declared task type:
//! regression prints raw values, classification prints the argmax index
//! followed by per-class probabilities. Values use fixed notation with six
//! fractional digits.

use crate::message::TaskType;
use std::fmt::Write;

/// Column header line, printed once before the first prediction.
pub fn header_line(task: TaskType, columns: usize) -> String {
    let mut line = String::new();
    if task.is_regression() {
        if columns == 1 {
            line.push_str("target");
        } else {
            for i in 1..=columns {
                let _ = write!(line, "Predicted value for output #{i}");
                if i < columns {
                    line.push(',');
                }
            }
        }
    } else {
        line.push_str("target");
        if columns > 1 {
            line.push(',');
        }
        for i in 0..columns {
            let _ = write!(line, "Probability of {i}");
            if i + 1 < columns {
                line.push(',');
            }
        }
    }
    line
}

/// One prediction row. Classification rows lead with the argmax index.
pub fn prediction_line(task: TaskType, results: &[f32]) -> String {
    let mut line = String::new();
    if !task.is_regression() {
        let _ = write!(line, "{},", argmax(results));
    }
    for (i, value) in results.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        let _ = write!(line, "{value:.6}");
    }
    line
}

// Running max starts at zero with a strict compare, so an all-nonpositive
// row reports class 0.
fn argmax(results: &[f32]) -> usize {
    let mut index = 0;
    let mut max = 0.0f32;
    for (i, &value) in results.iter().enumerate() {
        if max < value {
            index = i;
            max = value;
        }
    }
    index
}
