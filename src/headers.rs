// header values are byte sequences
// comparisons are case insensitive with surrounding whitespace stripped

fn trim(val: &[u8]) -> &[u8] {
    let mut val = val;
    while let Some((&ch, rest)) = val.split_first() {
        if matches!(ch, b'\r' | b'\n' | b' ' | b'\t') {
            val = rest;
        } else {
            break;
        }
    }
    while let Some((&ch, rest)) = val.split_last() {
        if matches!(ch, b'\r' | b'\n' | b' ' | b'\t') {
            val = rest;
        } else {
            break;
        }
    }
    val
}

pub fn is_chunked(val: &[u8]) -> bool {
    trim(val).eq_ignore_ascii_case(b"chunked")
}

/// Derives the response text encoding from a `Content-Type` value.
///
/// The `charset` parameter wins; otherwise `text/*` responses default to
/// ISO-8859-1 as RFC 2616 prescribed.
pub fn encoding_from_content_type(value: &[u8]) -> Option<String> {
    for param in value.split(|&x| x == b';').skip(1) {
        let param = trim(param);
        if param.len() > "charset=".len()
            && param[.."charset=".len()].eq_ignore_ascii_case(b"charset=")
        {
            let charset = trim(&param["charset=".len()..]);
            let charset = if charset.len() >= 2
                && charset[0] == b'"' && charset[charset.len()-1] == b'"'
            {
                &charset[1..charset.len()-1]
            } else {
                charset
            };
            return String::from_utf8(charset.to_vec()).ok();
        }
    }
    if trim(value).len() >= "text/".len()
        && trim(value)[.."text/".len()].eq_ignore_ascii_case(b"text/")
    {
        return Some(String::from("ISO-8859-1"));
    }
    None
}
