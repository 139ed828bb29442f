//! Markdown code-fence stripping for LLM replies.
//!
//! Models usually wrap a schema in a fenced block (```` ```prisma ````),
//! sometimes with prose around it. [`strip_code_fences`] keeps only the
//! fenced content.

/// Fence delimiter recognised at the start of a (trimmed) line.
pub const FENCE: &str = "```";

/// Extract the fenced content of `text`.
///
/// When `text` contains no fence the trimmed input is returned. Otherwise
/// every line whose trimmed form starts with [`FENCE`] toggles the in-block
/// state and is dropped, and only lines seen inside a block are kept.
/// Blocks do not nest: a fence line inside a block closes it. An unterminated
/// block runs to the end of the text. Multiple blocks are concatenated.
pub fn strip_code_fences(text: &str) -> String {
    if !text.contains(FENCE) {
        return text.trim().to_string();
    }

    let mut in_block = false;
    let mut kept: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().starts_with(FENCE) {
            in_block = !in_block;
            continue;
        }
        if in_block {
            kept.push(line);
        }
    }

    kept.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_only_trimmed() {
        let text = "  model User {\n  id Int @id\n}\n\n";
        assert_eq!(strip_code_fences(text), "model User {\n  id Int @id\n}");
    }

    #[test]
    fn stripping_is_idempotent_on_plain_text() {
        let once = strip_code_fences("generator client {\n  provider = \"prisma-client-js\"\n}");
        let twice = strip_code_fences(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn single_block_with_language_tag() {
        let reply = "```prisma\nmodel Post {\n  id Int @id\n}\n```";
        assert_eq!(strip_code_fences(reply), "model Post {\n  id Int @id\n}");
    }

    #[test]
    fn prose_around_block_is_discarded() {
        let reply = "Here is the fixed schema:\n\n```prisma\nmodel A {\n  id Int @id\n}\n```\n\nLet me know if you need more.";
        assert_eq!(strip_code_fences(reply), "model A {\n  id Int @id\n}");
    }

    #[test]
    fn multiple_blocks_are_concatenated() {
        let reply = "```\nmodel A {}\n```\nand also\n```prisma\nmodel B {}\n```";
        assert_eq!(strip_code_fences(reply), "model A {}\nmodel B {}");
    }

    #[test]
    fn unterminated_block_runs_to_end() {
        let reply = "Sure:\n```prisma\nmodel A {\n  id Int @id\n}";
        assert_eq!(strip_code_fences(reply), "model A {\n  id Int @id\n}");
    }

    #[test]
    fn nested_fence_closes_the_open_block() {
        // The inner opener closes the outer block; the text between the inner
        // pair is outside any block and gets dropped.
        let reply = "```markdown\nouter\n```prisma\ninner\n```\n```";
        assert_eq!(strip_code_fences(reply), "outer");
    }

    #[test]
    fn indented_fences_are_recognised() {
        let reply = "   ```prisma\nmodel A {}\n   ```   ";
        assert_eq!(strip_code_fences(reply), "model A {}");
    }

    #[test]
    fn inline_backticks_outside_line_start_drop_everything() {
        let reply = "use ```model A {}``` here";
        assert_eq!(strip_code_fences(reply), "");
    }

    #[test]
    fn empty_block_yields_empty_string() {
        assert_eq!(strip_code_fences("```prisma\n```"), "");
    }

    #[test]
    fn crlf_line_endings() {
        let reply = "```prisma\r\nmodel A {}\r\n```\r\n";
        assert_eq!(strip_code_fences(reply), "model A {}");
    }
}
