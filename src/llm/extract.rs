//! Pull runnable commands out of AI-generated text
//!
//! Assistant replies embed shell commands in fenced code blocks. Only blocks
//! tagged `bash`, `sh`, `shell` (any case) or left untagged count as shell.
//! `extract_command` deliberately returns a single line: auto-execution runs
//! one statement, never a whole AI-authored sequence.

const FENCE: &str = "```";

const SHELL_TAGS: [&str; 3] = ["bash", "sh", "shell"];

/// A fenced block found in free-form text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeBlock<'a> {
    /// Info string after the opening fence, trimmed; empty when untagged
    pub lang: &'a str,
    /// Raw content between the opening line and the closing fence
    pub body: &'a str,
}

impl CodeBlock<'_> {
    pub fn is_shell(&self) -> bool {
        self.lang.is_empty() || SHELL_TAGS.iter().any(|tag| self.lang.eq_ignore_ascii_case(tag))
    }
}

/// Every complete fenced block in `text`, in order
///
/// A block opens on a line that starts with a fence (after at most three
/// spaces of indent) and ends at the next fence. Fences in the middle of
/// prose never open a block. An unterminated block is ignored.
pub fn code_blocks(text: &str) -> Vec<CodeBlock<'_>> {
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some(line_len) = text[pos..].find('\n') {
        let body_start = pos + line_len + 1;
        let Some(info) = opening_fence(&text[pos..pos + line_len]) else {
            pos = body_start;
            continue;
        };

        let Some(close) = text[body_start..].find(FENCE) else {
            break;
        };
        blocks.push(CodeBlock {
            lang: info.trim(),
            body: &text[body_start..body_start + close],
        });

        // Resume at the line after the closing fence
        let after = body_start + close + FENCE.len();
        match text[after..].find('\n') {
            Some(offset) => pos = after + offset + 1,
            None => break,
        }
    }

    blocks
}

/// Info string of `line` if it opens a fenced block
fn opening_fence(line: &str) -> Option<&str> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let info = line[indent..].strip_prefix(FENCE)?;
    // ```ls``` on one line is inline code
    (!info.contains(FENCE)).then_some(info)
}

fn first_shell_block(text: &str) -> Option<CodeBlock<'_>> {
    code_blocks(text).into_iter().find(CodeBlock::is_shell)
}

/// First line of the first shell block, trimmed
///
/// Leading blank lines inside the block are skipped. Returns `None` when
/// there is no shell block or it is empty.
pub fn extract_command(text: &str) -> Option<String> {
    let block = first_shell_block(text)?;
    block
        .body
        .trim()
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
}

/// Every non-blank, non-comment line of the first shell block
///
/// For handing a whole suggested sequence to the queue, where each line runs
/// as its own item.
pub fn extract_script(text: &str) -> Vec<String> {
    first_shell_block(text)
        .map(|block| {
            block
                .body
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_bash_block() {
        let text = "Run this:\n```bash\nnmap -sV 10.0.0.1\n```\n";
        assert_eq!(extract_command(text).as_deref(), Some("nmap -sV 10.0.0.1"));
    }

    #[test]
    fn test_extract_first_line_of_first_block() {
        let text = r#"Start with discovery:
```bash
nmap -sn 10.0.0.0/24
nmap -sV 10.0.0.5
```
Then enumerate:
```bash
nikto -h http://10.0.0.5
gobuster dir -u http://10.0.0.5
```"#;
        assert_eq!(extract_command(text).as_deref(), Some("nmap -sn 10.0.0.0/24"));
    }

    #[test]
    fn test_no_code_returns_none() {
        assert_eq!(extract_command("no code here"), None);
        assert_eq!(extract_command(""), None);
    }

    #[test]
    fn test_sh_shell_and_untagged_accepted() {
        assert_eq!(extract_command("```sh\nid\n```").as_deref(), Some("id"));
        assert_eq!(extract_command("```shell\nwhoami\n```").as_deref(), Some("whoami"));
        assert_eq!(extract_command("```\nuname -a\n```").as_deref(), Some("uname -a"));
        assert_eq!(extract_command("```Bash\nls -la\n```").as_deref(), Some("ls -la"));
    }

    #[test]
    fn test_other_languages_are_skipped() {
        let text = "```python\nprint('hi')\n```\nand then\n```bash\ncurl -I http://target\n```";
        assert_eq!(extract_command(text).as_deref(), Some("curl -I http://target"));

        let only_python = "```python\nimport os\n```\ntrailing prose";
        assert_eq!(extract_command(only_python), None);
    }

    #[test]
    fn test_leading_blank_lines_and_indent_trimmed() {
        let text = "```bash\n\n   dig example.com  \nhost example.com\n```";
        assert_eq!(extract_command(text).as_deref(), Some("dig example.com"));
    }

    #[test]
    fn test_crlf_line_endings() {
        let text = "```bash\r\nwhois example.com\r\nid\r\n```";
        assert_eq!(extract_command(text).as_deref(), Some("whois example.com"));
    }

    #[test]
    fn test_empty_block_is_none() {
        assert_eq!(extract_command("```bash\n\n```"), None);
    }

    #[test]
    fn test_unterminated_block_is_none() {
        assert_eq!(extract_command("```bash\nnmap 10.0.0.1\n"), None);
    }

    #[test]
    fn test_inline_fence_is_not_a_block() {
        let text = "Use ```ls``` to list, or:\n```bash\npwd\n```";
        assert_eq!(extract_command(text).as_deref(), Some("pwd"));
    }

    #[test]
    fn test_fence_mentioned_in_prose_is_not_an_opener() {
        let text = "Wrap commands in ``` fences like this.\n```bash\nid\n```";
        assert_eq!(extract_command(text).as_deref(), Some("id"));

        let text = "The ```bash marker starts a block:\n```bash\nwhoami\n```";
        assert_eq!(extract_command(text).as_deref(), Some("whoami"));
    }

    #[test]
    fn test_opening_fence_indent() {
        let text = "Steps:\n   ```bash\n   netstat -tulpn\n   ```";
        assert_eq!(extract_command(text).as_deref(), Some("netstat -tulpn"));

        let code_span = "    ```bash\n    ss -lnt\n    ```";
        assert_eq!(extract_command(code_span), None);
    }

    #[test]
    fn test_deterministic() {
        let text = "```bash\nid\n```";
        assert_eq!(extract_command(text), extract_command(text));
    }

    #[test]
    fn test_code_blocks_lists_all() {
        let text = "```python\nx = 1\n```\n```\nls\n```";
        let blocks = code_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].lang, "python");
        assert!(!blocks[0].is_shell());
        assert_eq!(blocks[1].lang, "");
        assert!(blocks[1].is_shell());
        assert_eq!(blocks[1].body, "ls\n");
    }

    #[test]
    fn test_extract_script_keeps_every_command() {
        let text = "```bash\n# recon\nnmap -sn 10.0.0.0/24\n\nnmap -sV 10.0.0.5\n```";
        assert_eq!(
            extract_script(text),
            vec!["nmap -sn 10.0.0.0/24".to_string(), "nmap -sV 10.0.0.5".to_string()]
        );
        assert!(extract_script("nothing").is_empty());
    }
}
