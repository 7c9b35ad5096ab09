//! HTML index of the charts produced by one run.

use std::fs;
use std::path::{Path, PathBuf};

const HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Plot Gallery</title>
<style>
body {
    font-family: Arial, sans-serif;
    background-color: #f4f4f4;
    margin: 0;
    padding: 20px;
}
.container {
    max-width: 900px;
    margin: 0 auto;
}
h2 {
    color: #333;
}
img {
    display: block;
    margin: 10px auto;
    max-width: 100%;
    box-shadow: 0px 0px 5px 0px rgba(0,0,0,0.75);
}
</style>
</head>
<body>
<div class="container">
<h1>Plot Gallery</h1>
"#;

const TAIL: &str = "</div>\n</body>\n</html>\n";

/// Renders the gallery for `images`, each referenced by its path relative to
/// `base_dir` (the directory the gallery file lives in).
pub fn render_gallery(base_dir: &Path, images: &[PathBuf]) -> String {
    let mut html = String::from(HEAD);
    if images.is_empty() {
        html.push_str("<p>No charts were produced in this run.</p>\n");
    }
    for image in images {
        let href = relative_href(base_dir, image);
        let caption = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| href.clone());
        let href = escape(&href);
        let caption = escape(&caption);
        html.push_str(&format!("<h2>{caption}</h2>\n"));
        html.push_str(&format!(
            "<a href=\"{href}\"><img src=\"{href}\" alt=\"{caption}\" width=\"800\"></a>\n"
        ));
        html.push_str("<br>\n");
    }
    html.push_str(TAIL);
    html
}

/// Writes the gallery to `path`, replacing any previous version. The page
/// lists exactly `images`, nothing carried over from earlier runs.
pub fn write_gallery(path: &Path, images: &[PathBuf]) -> std::io::Result<()> {
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    if !base_dir.as_os_str().is_empty() {
        fs::create_dir_all(base_dir)?;
    }
    fs::write(path, render_gallery(base_dir, images))
}

fn relative_href(base_dir: &Path, image: &Path) -> String {
    let rel = image.strip_prefix(base_dir).unwrap_or(image);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn escape(s: &str) -> String {
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lists_exactly_the_given_images() {
        let base = Path::new("results");
        let images = vec![base.join("a-1_plot.svg"), base.join("b-2_plot.svg")];
        let html = render_gallery(base, &images);

        assert_eq!(html.matches("<img ").count(), 2);
        assert!(html.contains(r#"src="a-1_plot.svg""#));
        assert!(html.contains(r#"src="b-2_plot.svg""#));
        assert!(html.contains(r#"<a href="a-1_plot.svg">"#));
    }

    #[test]
    fn escapes_names() {
        let base = Path::new("out");
        let html = render_gallery(base, &[base.join("a&b<c>_plot.svg")]);
        assert!(html.contains("a&amp;b&lt;c&gt;_plot.svg"));
        assert!(!html.contains("a&b<c>"));
    }

    #[test]
    fn images_outside_base_keep_their_path() {
        let html = render_gallery(Path::new("results"), &[PathBuf::from("elsewhere/x_plot.svg")]);
        assert!(html.contains(r#"src="elsewhere/x_plot.svg""#));
    }

    #[test]
    fn empty_run_says_so() {
        let html = render_gallery(Path::new("results"), &[]);
        assert_eq!(html.matches("<img ").count(), 0);
        assert!(html.contains("No charts"));
    }

    #[test]
    fn rewrite_drops_stale_entries() {
        let dir = TempDir::new().unwrap();
        let results = dir.path().join("results");
        let gallery = results.join("plot_gallery.html");

        write_gallery(&gallery, &[results.join("old_plot.svg"), results.join("kept_plot.svg")]).unwrap();
        write_gallery(&gallery, &[results.join("kept_plot.svg")]).unwrap();

        let html = fs::read_to_string(&gallery).unwrap();
        assert!(!html.contains("old_plot.svg"));
        assert_eq!(html.matches("<img ").count(), 1);
    }
}
