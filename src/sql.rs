//! Client-side SQL text preparation.
//!
//! `query(sql, args)` splices argument text directly into the SQL, wrapped
//! in a dollar-quote delimiter derived from the statement text. This is not
//! protocol-level parameter binding and offers none of its guarantees; it
//! is kept for compatibility and deprecated in favor of server-side
//! prepared statements, which themselves execute through plain text
//! `PREPARE`/`EXECUTE`.

use md5::{Digest, Md5};
use rand::Rng;

use crate::error::{Error, Result};
use crate::value::Value;

/// Number of `?` placeholders in a statement.
///
/// Placeholder scanning is textual: a literal `?` inside a string constant
/// counts too, exactly like the substitution that follows it.
pub fn count_placeholders(sql: &str) -> usize {
    sql.matches('?').count()
}

/// Digit-stripped lowercase hex of `md5(hex(md5(input)))`. Only the letters
/// a-f survive, so the result can never collide with SQL syntax around a
/// dollar-quote delimiter.
fn double_md5_letters(input: &str) -> String {
    let inner = format!("{:x}", Md5::digest(input.as_bytes()));
    let outer = format!("{:x}", Md5::digest(inner.as_bytes()));
    outer.chars().filter(|c| !c.is_ascii_digit()).collect()
}

/// Slice a short identifier out of the digit-stripped digest at a random
/// offset, so repeated statements don't reuse one delimiter.
fn digest_slice(input: &str) -> String {
    let letters = double_md5_letters(input);
    let offset = rand::rng().random_range(0..10).min(letters.len());
    let end = (offset + 4).min(letters.len());
    letters[offset..end].to_string()
}

/// Generate a dollar-quote delimiter (`$abcd$`) for inline substitution.
fn dollar_tag(sql: &str) -> String {
    format!("${}$", digest_slice(sql))
}

/// Server-side statement name derived from the statement text.
pub fn statement_name(sql: &str) -> String {
    digest_slice(sql)
}

/// Substitute `?` placeholders with inline argument text.
///
/// Each placeholder is replaced left-to-right with the corresponding
/// argument wrapped in a per-call dollar-quote delimiter; NULL is spliced
/// in bare. Fails with [`Error::Argument`] before producing anything when
/// fewer arguments are supplied than placeholders. Surplus arguments are
/// ignored.
pub fn bind_inline(sql: &str, args: &[Value]) -> Result<String> {
    let wanted = count_placeholders(sql);
    if args.len() < wanted {
        return Err(Error::Argument(format!(
            "statement has {wanted} placeholders but {} arguments were supplied",
            args.len()
        )));
    }
    if wanted == 0 {
        return Ok(sql.to_string());
    }

    let tag = dollar_tag(sql);
    let mut out = String::with_capacity(sql.len());
    let mut args = args.iter();
    // split() yields n+1 pieces for n placeholders
    for piece in sql.split('?') {
        out.push_str(piece);
        if let Some(arg) = args.next() {
            match arg.to_inline_text() {
                Some(text) => {
                    out.push_str(&tag);
                    out.push_str(&text);
                    out.push_str(&tag);
                }
                None => out.push_str("NULL"),
            }
        }
    }
    Ok(out)
}

/// Replace `?` placeholders with sequential `$1..$n`, returning the rewritten
/// text and the placeholder count. Used to build `PREPARE` statements.
pub fn numbered_placeholders(sql: &str) -> (String, usize) {
    let mut out = String::with_capacity(sql.len());
    let mut count = 0;
    for (i, piece) in sql.split('?').enumerate() {
        if i > 0 {
            count += 1;
            out.push('$');
            out.push_str(&count.to_string());
        }
        out.push_str(piece);
    }
    (out, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_count() {
        assert_eq!(count_placeholders("SELECT 1"), 0);
        assert_eq!(count_placeholders("SELECT ?, ?"), 2);
    }

    #[test]
    fn tag_is_letters_only() {
        let tag = dollar_tag("SELECT * FROM t WHERE id = ?");
        assert!(tag.starts_with('$') && tag.ends_with('$'));
        let body = &tag[1..tag.len() - 1];
        assert!(body.len() <= 4);
        assert!(body.chars().all(|c| c.is_ascii_lowercase()));
    }

    #[test]
    fn inline_substitution() {
        let sql = "SELECT * FROM t WHERE a = ? AND b = ?";
        let out = bind_inline(sql, &[Value::Int(5), Value::Text("x".into())]).unwrap();
        assert!(!out.contains('?'));
        // Both arguments wrapped in the same delimiter.
        let tag_start = out.find('$').unwrap();
        let tag_end = out[tag_start + 1..].find('$').unwrap() + tag_start + 2;
        let tag = &out[tag_start..tag_end];
        assert_eq!(out.matches(tag).count(), 4);
        assert!(out.contains(&format!("{tag}5{tag}")));
        assert!(out.contains(&format!("{tag}x{tag}")));
    }

    #[test]
    fn null_is_spliced_bare() {
        let out = bind_inline("UPDATE t SET a = ?", &[Value::Null]).unwrap();
        assert_eq!(out, "UPDATE t SET a = NULL");
    }

    #[test]
    fn too_few_arguments_fail_before_substitution() {
        assert!(matches!(
            bind_inline("SELECT ?, ?", &[Value::Int(1)]),
            Err(Error::Argument(_))
        ));
    }

    #[test]
    fn no_placeholders_passes_through() {
        assert_eq!(bind_inline("SELECT 1", &[]).unwrap(), "SELECT 1");
    }

    #[test]
    fn numbered_rewrite() {
        let (out, n) = numbered_placeholders("INSERT INTO t VALUES (?, ?, ?)");
        assert_eq!(out, "INSERT INTO t VALUES ($1, $2, $3)");
        assert_eq!(n, 3);

        let (out, n) = numbered_placeholders("SELECT 1");
        assert_eq!(out, "SELECT 1");
        assert_eq!(n, 0);
    }

    #[test]
    fn statement_name_is_stable_letters() {
        let name = statement_name("SELECT 1");
        assert!(name.len() <= 4);
        assert!(name.chars().all(|c| c.is_ascii_lowercase()));
    }
}
