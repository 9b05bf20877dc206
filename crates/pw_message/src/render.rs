//! HTML-mode rendering of papers into message text.
//!
//! Escaping happens exactly once, on the user-controlled fields (title,
//! author names, abstract), never on template text. Tags never span a
//! paragraph break, which is what keeps paragraph-boundary chunking safe.

use pw_core::ident;
use pw_core::Paper;

const MAX_DISPLAY_AUTHORS: usize = 3;

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn author_line(authors: &[String]) -> String {
    let mut line = authors
        .iter()
        .take(MAX_DISPLAY_AUTHORS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if authors.len() > MAX_DISPLAY_AUTHORS {
        line.push_str(" et al.");
    }
    line
}

/// Digest list: one numbered item per paper, each with a follow-up
/// lookup command derived from the canonical ID.
pub fn render_papers(papers: &[Paper], heading: &str) -> String {
    let mut message = format!("📚 <b>{}</b> 📚\n\n", heading);
    for (i, paper) in papers.iter().enumerate() {
        message.push_str(&format!(
            "{}. <b>{}</b>\n",
            i + 1,
            escape_html(&paper.title)
        ));
        message.push_str(&format!(
            "   Authors: {}\n",
            escape_html(&author_line(&paper.authors))
        ));
        message.push_str(&format!(
            "   /abstract{}\n\n",
            ident::reference_token(&paper.canonical_id)
        ));
    }
    message
}

/// Single-paper block used by the lookup flow.
pub fn render_paper(paper: &Paper) -> String {
    format!(
        "<b>{}</b>\n\nAuthors: {}\nPublished: {}\n\n{}\n\n{}",
        escape_html(&paper.title),
        escape_html(&author_line(&paper.authors)),
        paper.published,
        escape_html(&paper.abstract_text),
        paper.link,
    )
}
