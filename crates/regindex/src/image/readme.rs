//! README rendering for the image detail view.

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag as MdTag, TagEnd, html};

/// Git ref README files are read from.
pub const README_REF: &str = "HEAD";

/// File name of a project's README, taken from its `readme_url`.
///
/// Only the last path segment is used, e.g.
/// `https://gitlab.example.com/group/app/-/blob/main/README.md` → `README.md`.
pub fn readme_file_name(readme_url: &str) -> Option<&str> {
    readme_url
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
}

/// Render Markdown to HTML with headings demoted by two levels.
///
/// Tables, definition lists and `{#id .class}` heading attributes are
/// enabled on top of CommonMark (which already covers fenced code).
pub fn render_readme(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_DEFINITION_LIST);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

    let events = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Start(MdTag::Heading {
            level,
            id,
            classes,
            attrs,
        }) => Event::Start(MdTag::Heading {
            level: demote(level),
            id,
            classes,
            attrs,
        }),
        Event::End(TagEnd::Heading(level)) => Event::End(TagEnd::Heading(demote(level))),
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

/// h1→h3, h2→h4, h3→h5, h4 and below→h6.
fn demote(level: HeadingLevel) -> HeadingLevel {
    match level {
        HeadingLevel::H1 => HeadingLevel::H3,
        HeadingLevel::H2 => HeadingLevel::H4,
        HeadingLevel::H3 => HeadingLevel::H5,
        HeadingLevel::H4 | HeadingLevel::H5 | HeadingLevel::H6 => HeadingLevel::H6,
    }
}
