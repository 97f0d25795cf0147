//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Trim and case-fold. Used for answer comparison.
pub fn normalize_answer(s: &str) -> String {
  s.trim().to_lowercase()
}

/// Trim, case-fold and collapse inner whitespace runs to one space.
/// Subjects and question texts go through this before hashing.
pub fn normalize_subject(s: &str) -> String {
  s.split_whitespace()
    .map(|w| w.to_lowercase())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Log-safe truncation for large strings (char boundary aware).
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_all_keys() {
    let out = fill_template("{subject} at {difficulty}, again {subject}", &[("subject", "WWII"), ("difficulty", "3")]);
    assert_eq!(out, "WWII at 3, again WWII");
  }

  #[test]
  fn normalize_subject_collapses_whitespace() {
    assert_eq!(normalize_subject("  World   War\tII "), "world war ii");
  }

  #[test]
  fn trunc_for_log_handles_multibyte() {
    assert_eq!(trunc_for_log("héllo", 10), "héllo");
    assert!(trunc_for_log("héllo wörld", 3).starts_with("hél…"));
  }
}
