use crate::bib::library::{Asset, CategoryScan, scan_category};
use crate::bib::paths::ArchivePaths;
use crate::bib::short_code::{gallery_sort_key, theme_of};
use crate::bib::util::write_string;
use anyhow::{Context, Result, anyhow};
use chrono::Local;
use std::path::{Path, PathBuf};
use url::Url;

const STYLE: &str = r#"
.image {
    display: inline-block;
    margin: 15px 10px;
    padding: 5px 0px;
    height: 200px;
    text-align: center;
}
.image img {
    max-height: 100%;
}
"#;

#[derive(Debug, Clone)]
pub struct GalleryOutcome {
    pub category: String,
    pub html_path: PathBuf,
    pub images: usize,
    pub linked: usize,
    pub themes: usize,
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// `file://` URL for an asset; relative paths resolve against the current dir.
pub fn file_url(path: &Path) -> Result<String> {
    let absolute = std::path::absolute(path)
        .with_context(|| format!("failed to resolve {}", path.display()))?;
    Url::from_file_path(&absolute)
        .map(|url| url.to_string())
        .map_err(|()| anyhow!("not a file path: {}", absolute.display()))
}

fn image_tile(image: &Asset, pdf: Option<&Asset>) -> Result<String> {
    let img = format!(
        r#"<img src="{}" alt="{}">"#,
        escape_html(&file_url(&image.path)?),
        escape_html(&image.file_name)
    );
    let inner = match pdf {
        Some(pdf) => format!(r#"<a href="{}">{img}</a>"#, escape_html(&file_url(&pdf.path)?)),
        None => img,
    };
    Ok(format!(r#"<div class="image">{inner}</div>"#))
}

pub fn render_gallery(category: &str, scan: &CategoryScan) -> Result<(String, usize, usize)> {
    let mut images: Vec<&Asset> = scan.images().collect();
    images.sort_by_key(|a| gallery_sort_key(&a.code, &a.title));

    let mut body = String::new();
    let mut previous_theme: Option<String> = None;
    let mut linked = 0usize;
    let mut themes = 0usize;
    for image in &images {
        let theme = theme_of(&image.code);
        if previous_theme.as_deref() != Some(theme.as_str()) {
            body.push_str(&format!("<h1>{}</h1>\n", escape_html(&theme)));
            themes += 1;
            previous_theme = Some(theme);
        }
        let pdf = scan.pdf_for(&image.code);
        if pdf.is_some() {
            linked += 1;
        }
        body.push_str(&image_tile(image, pdf)?);
        body.push('\n');
    }

    let html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Gallery - {title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<!-- generated {stamp} -->\n{body}</body>\n</html>\n",
        title = escape_html(category),
        stamp = Local::now().format("%Y-%m-%d %H:%M"),
    );
    Ok((html, linked, themes))
}

pub fn generate_category(paths: &ArchivePaths, category: &str) -> Result<GalleryOutcome> {
    let scan = scan_category(&paths.category_dir(category))?;
    let (html, linked, themes) = render_gallery(category, &scan)?;
    let html_path = paths.gallery_file(category);
    write_string(&html_path, &html)?;
    Ok(GalleryOutcome {
        category: category.to_string(),
        html_path,
        images: scan.images().count(),
        linked,
        themes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn file_urls_percent_encode_names() {
        assert_eq!(
            file_url(Path::new("/lib/PDF/A B#1?.png")).expect("url"),
            "file:///lib/PDF/A%20B%231%3F.png"
        );
    }

    #[test]
    fn relative_file_urls_resolve_against_current_dir() {
        let url = file_url(Path::new("lib/PDF/Robotics/A-2001-T x.png")).expect("url");
        assert_ne!(url, "file:///lib/PDF/Robotics/A-2001-T%20x.png");
        let back = Url::parse(&url)
            .expect("parse")
            .to_file_path()
            .expect("file path");
        let cwd = std::env::current_dir().expect("cwd");
        assert_eq!(back, cwd.join("lib/PDF/Robotics/A-2001-T x.png"));
    }

    #[test]
    fn gallery_groups_by_theme_and_links_matching_pdf() {
        let tmp = tempdir().expect("tempdir");
        let paths = ArchivePaths::under(tmp.path());
        let dir = paths.category_dir("Robotics");
        fs::create_dir_all(&dir).expect("mkdir");
        for name in [
            "Smith-2020-Arms Robot Arms.png",
            "Smith-2020-Arms Robot Arms.pdf",
            "Smith-2020-Arms-2 Second Arms.png",
            "Jones-2019-Legs Legs & Feet.jpg",
            "Smith-2020-Arms-2X Not A Match.pdf",
        ] {
            fs::write(dir.join(name), "").expect("write");
        }

        let out = generate_category(&paths, "Robotics").expect("gallery");
        assert_eq!(out.images, 3);
        assert_eq!(out.linked, 1);
        assert_eq!(out.themes, 2);

        let html = fs::read_to_string(&out.html_path).expect("read html");
        let arms = html.find("<h1>Arms</h1>").expect("arms heading");
        let legs = html.find("<h1>Legs</h1>").expect("legs heading");
        assert!(arms < legs);
        assert_eq!(html.matches("<h1>").count(), 2);
        assert!(html.contains("Legs &amp; Feet.jpg"));
        assert!(html.contains("Smith-2020-Arms%20Robot%20Arms.pdf\"><img"));
        assert!(out.html_path.ends_with("Gallery/Gallery - Robotics.html"));
    }

    #[test]
    fn single_theme_gallery_still_has_heading() {
        let scan = CategoryScan {
            assets: vec![
                crate::bib::library::parse_asset(Path::new("/x/A-2001-Solo One.png"))
                    .expect("asset"),
            ],
            malformed: Vec::new(),
        };
        let (html, _, themes) = render_gallery("X", &scan).expect("render");
        assert_eq!(themes, 1);
        assert!(html.contains("<h1>Solo</h1>"));
    }
}
