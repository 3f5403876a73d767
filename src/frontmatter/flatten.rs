use super::types::{Header, HeaderValue};

/// Nesting limit for frontmatter records. Real headers are a handful of levels deep.
pub const MAX_FLATTEN_DEPTH: usize = 32;

/// One leaf of a flattened header: dotted path plus the value found there
#[derive(Debug, Clone, PartialEq)]
pub struct FlatField {
    pub key: String,
    pub value: HeaderValue,
}

/// Flatten a nested header into (dotted path, leaf value) pairs.
///
/// Records are descended depth-first and their keys joined with `.`; arrays are
/// leaves even when they hold records. Output follows the order keys appear in
/// the header.
pub fn flatten(header: &Header) -> Result<Vec<FlatField>, String> {
    let mut fields = Vec::with_capacity(header.len());
    flatten_into(header, "", 0, &mut fields)?;
    Ok(fields)
}

fn flatten_into(
    header: &Header,
    prefix: &str,
    depth: usize,
    out: &mut Vec<FlatField>,
) -> Result<(), String> {
    if depth >= MAX_FLATTEN_DEPTH {
        return Err(format!(
            "Frontmatter nested deeper than {} levels at '{}'",
            MAX_FLATTEN_DEPTH, prefix
        ));
    }

    for (key, value) in header.iter() {
        let path = if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            HeaderValue::Record(nested) => flatten_into(nested, &path, depth + 1, out)?,
            leaf => out.push(FlatField {
                key: path,
                value: leaf.clone(),
            }),
        }
    }
    Ok(())
}
