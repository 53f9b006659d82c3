//! The embedded workflow schema prepended to every saved document.

/// Marks the boundary between the embedded schema and the caller's
/// document text, so the original text can be recovered on read without
/// re-parsing the schema itself.
pub const DOCUMENT_MARKER: &str = "\n// --- workflow document below ---\n";

const SCHEMA_SOURCE: &str = r#"package workflow

#Workflow: {
    name:        string
    description: string | *""
    steps: [...#Step]
    user_parameters?:   {[string]: #UserParameter}
    service_bindings?:  {[string]: #ServiceBinding}
    execution_config?:  #ExecutionConfig
}

#Step: {
    id:          string
    name?:       string
    service?:    string
    action:      string
    inputs?:     {[string]: _}
    outputs?:    {[string]: string}
    depends_on?: [...string]
}
"#;

/// The schema text with its `package ...` header line stripped, so it
/// can be embedded into a document that declares its own package (or
/// none at all) without colliding.
#[must_use]
pub fn embedded_schema() -> String {
    SCHEMA_SOURCE
        .lines()
        .filter(|line| !line.trim_start().starts_with("package "))
        .collect::<Vec<_>>()
        .join("\n")
}

/// True if `document_text` already contains the embedded schema,
/// meaning a naive unconditional prepend would duplicate it.
#[must_use]
pub fn already_embedded(document_text: &str) -> bool {
    document_text.contains(embedded_schema().trim())
}

/// Build the on-disk `workflow.cue` contents: schema, marker, then the
/// caller's original document text untouched.
#[must_use]
pub fn prepend_schema(document_text: &str) -> String {
    format!("{}{}{}", embedded_schema(), DOCUMENT_MARKER, document_text)
}

/// Recover the original document text from a `workflow.cue` file's
/// contents, stripping the embedded schema prefix if present.
#[must_use]
pub fn strip_schema(file_contents: &str) -> &str {
    match file_contents.split_once(DOCUMENT_MARKER) {
        Some((_, document)) => document,
        None => file_contents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepend_then_strip_round_trips() {
        let original = "workflow:\n  name: Test\n";
        let prepended = prepend_schema(original);
        assert_eq!(strip_schema(&prepended), original);
    }

    #[test]
    fn package_header_is_stripped_from_embedded_schema() {
        assert!(!embedded_schema().lines().any(|l| l.trim_start().starts_with("package ")));
    }

    #[test]
    fn detects_schema_already_present() {
        let doc_with_schema = prepend_schema("workflow:\n  name: x\n");
        assert!(already_embedded(&doc_with_schema));
        assert!(!already_embedded("workflow:\n  name: x\n"));
    }

    #[test]
    fn strip_schema_is_a_no_op_without_marker() {
        let plain = "workflow:\n  name: Test\n";
        assert_eq!(strip_schema(plain), plain);
    }
}
