use serde::{Deserialize, Serialize};

/// A raw (encoded) source map as produced by an upstream transform. Only the
/// fields needed to trace locations are modelled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSourceMap {
    pub version: u8,
    pub file: Option<String>,
    pub sources: Vec<String>,
    pub names: Vec<String>,
    pub mappings: String,
}

/// A location traced back through a sourcemap chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalLocation {
    pub source: Option<String>,
    /// 1-based.
    pub line: usize,
    /// 0-based.
    pub column: usize,
}

/// Traces a generated position through `chain`, last transform first, to the
/// position in the pre-transform source. Returns `Ok(None)` when some map in
/// the chain has no segment for the position, and `Err` when a map cannot be
/// decoded.
pub fn trace_original_location(
    chain: &[RawSourceMap],
    line: usize,
    column: usize,
) -> Result<Option<OriginalLocation>, String> {
    let mut location = OriginalLocation {
        source: None,
        line,
        column,
    };
    for map in chain.iter().rev() {
        match lookup(map, location.line, location.column)? {
            Some(traced) => location = traced,
            None => return Ok(None),
        }
    }
    if chain.is_empty() {
        return Ok(None);
    }
    Ok(Some(location))
}

fn lookup(map: &RawSourceMap, line: usize, column: usize) -> Result<Option<OriginalLocation>, String> {
    // running VLQ state: source index, source line, source column. The
    // generated column resets per line, the rest accumulates across lines.
    let mut source_index = 0i64;
    let mut source_line = 0i64;
    let mut source_column = 0i64;
    let mut best: Option<(i64, i64, i64)> = None;

    for (index, segments) in map.mappings.split(';').enumerate() {
        if index + 1 > line {
            break;
        }
        let mut generated_column = 0i64;
        for segment in segments.split(',') {
            if segment.is_empty() {
                continue;
            }
            let fields = decode_vlq_segment(segment)?;
            generated_column += fields[0];
            if fields.len() >= 4 {
                source_index += fields[1];
                source_line += fields[2];
                source_column += fields[3];
                if index + 1 == line && generated_column <= column as i64 {
                    best = Some((source_index, source_line, source_column));
                }
            }
        }
    }

    Ok(best.map(|(index, line, column)| OriginalLocation {
        source: map.sources.get(index.max(0) as usize).cloned(),
        line: (line.max(0) as usize) + 1,
        column: column.max(0) as usize,
    }))
}

const BASE64_CHARS: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn base64_value(byte: u8) -> Result<i64, String> {
    BASE64_CHARS
        .iter()
        .position(|candidate| *candidate == byte)
        .map(|position| position as i64)
        .ok_or_else(|| format!("invalid base64 character '{}' in mappings", byte as char))
}

/// Decodes one comma-separated segment of base64 VLQ values.
fn decode_vlq_segment(segment: &str) -> Result<Vec<i64>, String> {
    let mut values = Vec::with_capacity(5);
    let mut shift = 0u32;
    let mut value = 0i64;
    for byte in segment.bytes() {
        let digit = base64_value(byte)?;
        let continues = digit & 0x20 != 0;
        value += (digit & 0x1f) << shift;
        if continues {
            shift += 5;
            if shift > 60 {
                return Err("VLQ value too large in mappings".to_string());
            }
        } else {
            let negative = value & 1 != 0;
            value >>= 1;
            values.push(if negative { -value } else { value });
            shift = 0;
            value = 0;
        }
    }
    if shift != 0 {
        return Err("truncated VLQ segment in mappings".to_string());
    }
    if values.len() != 1 && values.len() != 4 && values.len() != 5 {
        return Err(format!("unexpected VLQ segment length {}", values.len()));
    }
    Ok(values)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{decode_vlq_segment, trace_original_location, RawSourceMap};

    fn map_with(mappings: &str) -> RawSourceMap {
        RawSourceMap {
            version: 3,
            file: None,
            sources: vec!["original.js".to_string()],
            names: vec![],
            mappings: mappings.to_string(),
        }
    }

    #[test]
    fn decodes_vlq_segments() {
        assert_eq!(decode_vlq_segment("AAAA").unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(decode_vlq_segment("AACA").unwrap(), vec![0, 0, 1, 0]);
        // continuation: 16 encodes as "gB"
        assert_eq!(decode_vlq_segment("gBAAA").unwrap(), vec![16, 0, 0, 0]);
        // sign bit: -1 encodes as "D"
        assert_eq!(decode_vlq_segment("D").unwrap(), vec![-1]);
    }

    #[test]
    fn rejects_garbage_mappings() {
        assert!(decode_vlq_segment("!!").is_err());
        assert!(decode_vlq_segment("g").is_err());
    }

    #[test]
    fn traces_through_a_single_map() {
        // generated line 1 col 0 -> original line 1 col 0;
        // generated line 2 col 0 -> original line 3 col 4
        let map = map_with("AAAA;AAEI");
        let traced = trace_original_location(&[map], 2, 0).unwrap().unwrap();
        assert_eq!(traced.source.as_deref(), Some("original.js"));
        assert_eq!((traced.line, traced.column), (3, 4));
    }

    #[test]
    fn traces_through_a_chain_in_reverse_order() {
        let first = map_with("AAAA;AAEA"); // line 2 -> line 3 of the original
        let second = map_with("AAAA;AACA"); // line 2 -> line 2 of the intermediate
        let traced = trace_original_location(&[first, second], 2, 0)
            .unwrap()
            .unwrap();
        assert_eq!(traced.line, 3);
    }

    #[test]
    fn missing_lines_resolve_to_none() {
        let map = map_with("AAAA");
        assert_eq!(trace_original_location(&[map], 5, 0).unwrap(), None);
    }
}
