//! Configuration label synthesis

use crate::config::{ConfigDescriptor, LabelOptions};

/// Builds a display label from a configuration name.
///
/// The name is split on `_` and the components at `indices` are joined with
/// `_`. Out-of-range indices are skipped; when none resolve the first
/// component is used, and a name without `_` is used verbatim. Grid and
/// member identifiers are appended when requested and non-empty.
pub fn synthesize_label(
    name: &str,
    indices: &[usize],
    grid: &str,
    member: &str,
    include_grid: bool,
    include_member: bool,
) -> String {
    let parts: Vec<&str> = name.split('_').collect();
    let mut label = if parts.len() == 1 {
        name.to_string()
    } else {
        let picked: Vec<&str> = indices.iter().filter_map(|&i| parts.get(i).copied()).collect();
        if picked.is_empty() {
            parts[0].to_string()
        } else {
            picked.join("_")
        }
    };
    if include_grid && !grid.is_empty() {
        label.push('_');
        label.push_str(grid);
    }
    if include_member && !member.is_empty() {
        label.push('_');
        label.push_str(member);
    }
    label
}

/// Label of one (configuration, member, grid) line or panel. An explicit
/// display label is used verbatim, with grid and member appended as asked.
pub fn descriptor_label(
    descriptor: &ConfigDescriptor,
    member: &str,
    grid: &str,
    options: &LabelOptions,
) -> String {
    match &descriptor.label {
        Some(label) => {
            let mut out = label.clone();
            for (include, part) in [(options.grid, grid), (options.member, member)] {
                if include && !part.is_empty() {
                    out.push('_');
                    out.push_str(part);
                }
            }
            out
        }
        None => synthesize_label(
            &descriptor.name,
            &options.indices,
            grid,
            member,
            options.grid,
            options.member,
        ),
    }
}
