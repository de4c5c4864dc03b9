//! `caselink plan-files` command.

use crate::model::DocumentDescriptor;
use crate::placement::plan_placement;

/// Execute the `plan-files` command.
///
/// Prints each declared name and the name it would be uploaded under, one
/// pair per line, in submission order.
///
/// # Errors
///
/// Never fails.
pub fn run(names: &[String]) -> Result<(), String> {
    let descriptors: Vec<DocumentDescriptor> = names
        .iter()
        .map(|name| DocumentDescriptor { key: name.clone(), filename: name.clone() })
        .collect();
    for (name, planned) in names.iter().zip(plan_placement(&descriptors)) {
        println!("{name} -> {}", planned.filename);
    }
    Ok(())
}
