//! Path string parsing
//!
//! Grammar: segments preceded by the start of the string or by `/` are
//! packages; segments preceded by `:` are objects. `/` may not appear
//! after the first `:`, and a `*index` suffix (decimal u32) is only
//! permitted on the final segment. Nothing is interned for a string that
//! fails to parse.

use crate::{
    PathError, FILE_INSTANCE_MARK, INSTANCE_DELIMITER, OBJECT_DELIMITER, PACKAGE_DELIMITER,
};

/// One parsed path segment, borrowing from the input string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathSegment<'s> {
    /// Segment name
    pub name: &'s str,
    /// Optional instance index disambiguator
    pub instance_index: Option<u32>,
    /// True for package segments, false for object segments
    pub is_package: bool,
}

/// Split a path string into segments.
pub fn parse_path(input: &str) -> Result<Vec<PathSegment<'_>>, PathError> {
    if input.is_empty() {
        return Err(PathError::Empty);
    }

    let mut segments = Vec::new();
    let mut seg_start = 0usize;
    // Byte offset of the '*' in the current segment, if seen.
    let mut star: Option<usize> = None;
    let mut next_is_package = true;
    let mut seen_object = false;

    for (i, c) in input.char_indices() {
        match c {
            PACKAGE_DELIMITER | OBJECT_DELIMITER => {
                if star.is_some() {
                    return Err(PathError::InstanceNotLast(i));
                }
                if c == PACKAGE_DELIMITER && seen_object {
                    return Err(PathError::PackageAfterObject(i));
                }
                push_segment(input, seg_start, i, None, next_is_package, &mut segments)?;
                next_is_package = c == PACKAGE_DELIMITER;
                if c == OBJECT_DELIMITER {
                    seen_object = true;
                }
                seg_start = i + c.len_utf8();
            }
            INSTANCE_DELIMITER => {
                if star.is_some() {
                    return Err(PathError::InvalidInstanceIndex(
                        input[seg_start..].to_string(),
                    ));
                }
                star = Some(i);
            }
            _ => {}
        }
    }

    push_segment(
        input,
        seg_start,
        input.len(),
        star,
        next_is_package,
        &mut segments,
    )?;
    Ok(segments)
}

fn push_segment<'s>(
    input: &'s str,
    start: usize,
    end: usize,
    star: Option<usize>,
    is_package: bool,
    out: &mut Vec<PathSegment<'s>>,
) -> Result<(), PathError> {
    let (name_end, instance_index) = match star {
        Some(s) => {
            let digits = &input[s + INSTANCE_DELIMITER.len_utf8()..end];
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(PathError::InvalidInstanceIndex(digits.to_string()));
            }
            let index = digits
                .parse::<u32>()
                .map_err(|_| PathError::InvalidInstanceIndex(digits.to_string()))?;
            (s, Some(index))
        }
        None => (end, None),
    };

    let name = &input[start..name_end];
    if name.is_empty() {
        return Err(PathError::EmptySegment(start));
    }
    validate_name(name)?;

    out.push(PathSegment {
        name,
        instance_index,
        is_package,
    });
    Ok(())
}

/// Check that a name is non-empty and free of delimiter characters.
pub fn validate_name(name: &str) -> Result<(), PathError> {
    if name.is_empty() {
        return Err(PathError::EmptySegment(0));
    }
    if let Some(c) = name.chars().find(|&c| {
        c == PACKAGE_DELIMITER
            || c == OBJECT_DELIMITER
            || c == INSTANCE_DELIMITER
            || c == FILE_INSTANCE_MARK
    }) {
        return Err(PathError::InvalidName(name.to_string(), c));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_package() {
        let segs = parse_path("Art").unwrap();
        assert_eq!(
            segs,
            vec![PathSegment {
                name: "Art",
                instance_index: None,
                is_package: true
            }]
        );
    }

    #[test]
    fn test_packages_and_object() {
        let segs = parse_path("Art/Characters:Hero*2").unwrap();
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0].name, "Art");
        assert!(segs[0].is_package);
        assert_eq!(segs[1].name, "Characters");
        assert!(segs[1].is_package);
        assert_eq!(segs[2].name, "Hero");
        assert!(!segs[2].is_package);
        assert_eq!(segs[2].instance_index, Some(2));
    }

    #[test]
    fn test_nested_objects() {
        let segs = parse_path("Pkg:Outer:Inner").unwrap();
        assert!(segs[0].is_package);
        assert!(!segs[1].is_package);
        assert!(!segs[2].is_package);
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(parse_path(""), Err(PathError::Empty));
    }

    #[test]
    fn test_empty_segment() {
        assert_eq!(parse_path("Art//Chars"), Err(PathError::EmptySegment(4)));
        assert_eq!(parse_path("Art/"), Err(PathError::EmptySegment(4)));
        assert_eq!(parse_path(":Hero"), Err(PathError::EmptySegment(0)));
    }

    #[test]
    fn test_package_after_object() {
        assert_eq!(
            parse_path("Art:Hero/Nope"),
            Err(PathError::PackageAfterObject(8))
        );
    }

    #[test]
    fn test_instance_index_not_last() {
        assert_eq!(
            parse_path("Art*2/Chars:Hero"),
            Err(PathError::InstanceNotLast(5))
        );
    }

    #[test]
    fn test_malformed_instance_index() {
        assert!(matches!(
            parse_path("Art:Hero*"),
            Err(PathError::InvalidInstanceIndex(_))
        ));
        assert!(matches!(
            parse_path("Art:Hero*x1"),
            Err(PathError::InvalidInstanceIndex(_))
        ));
        assert!(matches!(
            parse_path("Art:Hero*1*2"),
            Err(PathError::InvalidInstanceIndex(_))
        ));
        // Larger than u32.
        assert!(matches!(
            parse_path("Art:Hero*99999999999"),
            Err(PathError::InvalidInstanceIndex(_))
        ));
    }

    #[test]
    fn test_file_mark_rejected_in_names() {
        assert_eq!(
            parse_path("Art:He!ro"),
            Err(PathError::InvalidName("He!ro".to_string(), '!'))
        );
    }

    #[test]
    fn test_index_zero_and_leading_zeros() {
        let segs = parse_path("Art:Hero*0").unwrap();
        assert_eq!(segs[1].instance_index, Some(0));

        // Leading zeros parse but are not canonical; rendering normalizes.
        let segs = parse_path("Art:Hero*007").unwrap();
        assert_eq!(segs[1].instance_index, Some(7));
    }
}
