//! Static entries for the Apps and Docs categories

use crate::transform::{Category, DisplayResult, ResultSource};

const APPS: &[(&str, &str, &str)] = &[
    ("onenote-win10", "OneNote for Windows 10", "📓"),
    ("nvidia-control", "NVIDIA Control Panel", "🎮"),
    ("onenote", "OneNote", "📓"),
    ("notepad", "Notepad", "📝"),
    ("notepad-plus", "Notepad++", "📄"),
    ("notion", "Notion", "📋"),
    ("notes-app", "Notes", "🗒️"),
    ("vscode", "Visual Studio Code", "💻"),
    ("chrome", "Google Chrome", "🌐"),
    ("photoshop", "Adobe Photoshop", "🎨"),
];

const DOCS: &[(&str, &str, &str)] = &[
    ("my-document1", "Meeting notes - December 2024.docx", "📄"),
    ("my-document2", "Project plan.docx", "📄"),
    ("my-document3", "Annual report.pdf", "📄"),
    ("my-document4", "User requirements analysis.xlsx", "📊"),
    ("my-document5", "Product prototype.pptx", "📋"),
    ("my-document6", "Technical notes.md", "📝"),
    ("my-document7", "Database design.sql", "🗃️"),
    ("my-document8", "API reference.json", "🔗"),
];

fn build(entries: &[(&str, &str, &str)], category: Category) -> Vec<DisplayResult> {
    entries
        .iter()
        .map(|(id, title, icon)| DisplayResult {
            id: (*id).to_string(),
            title: (*title).to_string(),
            subtitle: Some(category.label().to_string()),
            category,
            icon: (*icon).to_string(),
            time_range: None,
            description: None,
            source: ResultSource::Static,
        })
        .collect()
}

/// Apps entries followed by Docs entries.
pub fn static_results() -> Vec<DisplayResult> {
    let mut out = build(APPS, Category::Apps);
    out.extend(build(DOCS, Category::Docs));
    out
}
