use std::collections::HashSet;

use crate::domain::{CrossRef, HierarchyNode, INTERPRO_DB, create_cross_ref};
use crate::error::DumpError;

pub const MAX_HIERARCHY_DEPTH: usize = 64;

pub fn flatten_hierarchy(
    record: &str,
    root: &HierarchyNode,
) -> Result<Vec<CrossRef>, DumpError> {
    let mut output = Vec::new();
    let Some(children) = root.children.as_deref() else {
        return Ok(output);
    };

    let mut ancestors = HashSet::new();
    if let Some(accession) = root.accession.as_deref() {
        ancestors.insert(accession.to_string());
    }
    walk(record, children, 1, &mut ancestors, &mut output)?;
    Ok(output)
}

fn walk(
    record: &str,
    nodes: &[HierarchyNode],
    depth: usize,
    ancestors: &mut HashSet<String>,
    output: &mut Vec<CrossRef>,
) -> Result<(), DumpError> {
    if depth > MAX_HIERARCHY_DEPTH {
        return Err(DumpError::HierarchyTooDeep {
            accession: record.to_string(),
            limit: MAX_HIERARCHY_DEPTH,
        });
    }

    for node in nodes {
        let accession = node
            .accession
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| DumpError::HierarchyNode {
                accession: record.to_string(),
            })?;
        if ancestors.contains(accession) {
            return Err(DumpError::HierarchyCycle {
                accession: record.to_string(),
                repeated: accession.to_string(),
            });
        }
        output.push(create_cross_ref(INTERPRO_DB, accession));

        if let Some(children) = node.children.as_deref() {
            ancestors.insert(accession.to_string());
            walk(record, children, depth + 1, ancestors, output)?;
            ancestors.remove(accession);
        }
    }
    Ok(())
}
