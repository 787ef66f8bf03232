//! HTML pages for the report views.
//!
//! Pages are plain server-rendered HTML with no client-side code. Every
//! value that came from a stored document is escaped.

use std::fmt::Write;

use serde_json::Value;

use crate::item_list::ItemList;
use crate::store::docpath_of;
use crate::views::{Collaborators, GithubRepositories, ListView};

pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n<h1>{}</h1>\n{}</body>\n</html>\n",
        html_escape(title),
        html_escape(title),
        body
    )
}

fn title_for(docpath: &str) -> String {
    docpath.replace('_', " ")
}

fn updated_line(updated_at: &str) -> String {
    if updated_at.is_empty() {
        "<p class=\"updated\">No data available.</p>\n".to_string()
    } else {
        format!(
            "<p class=\"updated\">Last updated: {}</p>\n",
            html_escape(updated_at)
        )
    }
}

/// Landing page listing every stored document.
pub fn render_index(files: &[String]) -> String {
    let mut body = String::from("<ul>\n");
    for file in files {
        let docpath = docpath_of(file);
        let _ = writeln!(
            body,
            "<li><a href=\"/{}\">{}</a></li>",
            html_escape(docpath),
            html_escape(&title_for(docpath))
        );
    }
    body.push_str("</ul>\n");
    page("Reports", &body)
}

pub fn render_view(view: &ListView) -> String {
    let body = match view {
        ListView::Items(items) => items_body(items),
        ListView::Collaborators(c) => collaborators_body(c),
        ListView::Repositories(r) => repositories_body(r),
    };
    page(&title_for(view.docpath()), &body)
}

fn items_body(items: &ItemList) -> String {
    let mut body = updated_line(items.updated_at());
    let _ = writeln!(body, "<p>{} items</p>", items.todo_count());
    body.push_str("<ul>\n");
    for record in items.list() {
        let text = match record {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let _ = writeln!(body, "<li>{}</li>", html_escape(&text));
    }
    body.push_str("</ul>\n");
    body
}

fn collaborators_body(view: &Collaborators) -> String {
    let mut body = updated_line(view.updated_at());
    let _ = writeln!(
        body,
        "<p>{} collaborators across {} repositories</p>",
        view.collaborators().len(),
        view.repositories().len()
    );
    for (group, records) in view.grouped() {
        let _ = writeln!(body, "<h2>{}</h2>\n<ul>", html_escape(group));
        for record in records {
            let _ = writeln!(
                body,
                "<li><a href=\"https://github.com/{}\">{}</a> &mdash; {}</li>",
                html_escape(&record.login),
                html_escape(&record.login),
                html_escape(&record.repository)
            );
        }
        body.push_str("</ul>\n");
    }
    body
}

fn repositories_body(view: &GithubRepositories) -> String {
    let mut body = updated_line(view.updated_at());
    let _ = writeln!(
        body,
        "<p>{} repositories: {} passing, {} failing</p>",
        view.repositories().len(),
        view.passing().len(),
        view.failing().len()
    );

    body.push_str("<h2>Failing</h2>\n<table>\n<tr><th>Repository</th><th>Problems</th><th>Last push</th></tr>\n");
    for repo in view.failing() {
        let problems = repo
            .problems()
            .iter()
            .map(|p| html_escape(p))
            .collect::<Vec<_>>()
            .join("<br>");
        let _ = writeln!(
            body,
            "<tr><td><a href=\"{}\">{}</a></td><td>{}</td><td>{}</td></tr>",
            html_escape(&repo.url),
            html_escape(&repo.name),
            problems,
            html_escape(repo.last_push.as_deref().unwrap_or("never"))
        );
    }
    body.push_str("</table>\n");

    body.push_str("<h2>Passing</h2>\n<ul>\n");
    for repo in view.passing() {
        let _ = writeln!(
            body,
            "<li><a href=\"{}\">{}</a></li>",
            html_escape(&repo.url),
            html_escape(&repo.name)
        );
    }
    body.push_str("</ul>\n");
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item_list::DATA_KEY;
    use serde_json::json;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            html_escape("<a href='x'>&\"</a>"),
            "&lt;a href=&#39;x&#39;&gt;&amp;&quot;&lt;/a&gt;"
        );
    }

    #[test]
    fn index_links_each_document() {
        let html = render_index(&[
            "data/github_repositories.json".to_string(),
            "data/todo.json".to_string(),
        ]);
        assert!(html.contains("<a href=\"/github_repositories\">github repositories</a>"));
        assert!(html.contains("<a href=\"/todo\">todo</a>"));
    }

    #[test]
    fn raw_list_page_escapes_records() {
        let body = json!({"data": ["<script>", 5], "updated_at": "2024-01-01"}).to_string();
        let view = ListView::Items(ItemList::from_json("data/my_list.json", DATA_KEY, &body));
        let html = render_view(&view);

        assert!(html.contains("<title>my list</title>"));
        assert!(html.contains("Last updated: 2024-01-01 00:00:00"));
        assert!(html.contains("<li>&lt;script&gt;</li>"));
        assert!(html.contains("<li>5</li>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn empty_view_says_so() {
        let view = ListView::Items(ItemList::from_json("data/x.json", DATA_KEY, "nope"));
        let html = render_view(&view);
        assert!(html.contains("No data available."));
        assert!(html.contains("<p>0 items</p>"));
    }
}
