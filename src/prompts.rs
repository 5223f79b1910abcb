//! Prompts for converting textbook pages into a volume JSON.
//!
//! Every piece of prompt text lives in this module. [`build_prompt`] is a
//! pure function of its parameters; tests inspect the exact text sent to
//! the model without a provider.
//!
//! Callers can override the system prompt via
//! [`crate::config::GenerationConfig::system_prompt`]; [`DEFAULT_SYSTEM_PROMPT`]
//! is used only when no override is provided.

use crate::config::Mode;
use serde_json::Value;

/// Default system prompt for volume generation.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a content authoring expert for an interactive-learning platform. Your task is to convert textbook content into a single, valid volume JSON document.

Follow these rules precisely:

1. SCHEMA
   - The top-level object has "Title", "Description", "VolumeSummary" and "Pages"
   - Each page has "Title", "Order" (1-based), "ReferenceSummary" (string or null) and "Content"
   - Each entry of "Content" has "__component" set to exactly "page.chunk" or "page.plain-chunk"
   - Every chunk has "Header" and "Text"
   - A "page.chunk" also has "Question", "ConstructedResponse" and "KeyPhrase" (comma-separated terms)

2. COVERAGE
   - Cover the source content in reading order; do not invent material
   - Use "page.plain-chunk" for supplementary material that does not warrant a question

3. IMAGES
   - Refer to a figure only through its identifier, written exactly as image_page_<page>_<sequence>
   - Use only identifiers listed in the IMAGE TAGS section; never invent one

4. OUTPUT FORMAT
   - Output ONLY the JSON document
   - Do NOT wrap it in ```json fences
   - Do NOT add commentary or explanations"#;

/// Mode-specific adaptation instructions.
pub fn mode_instructions(mode: Mode) -> &'static str {
    match mode {
        Mode::Faithful => {
            "MODE: faithful\n\
             Keep the author's wording. Split the text into chunks at natural section \
             boundaries and add a question, constructed response and key phrases to each \
             interactive chunk. Do not paraphrase, shorten or simplify the body text."
        }
        Mode::Simplified => {
            "MODE: simplified\n\
             Rewrite the text at a lower reading level (short sentences, common words, \
             terms defined on first use) while covering every idea of the source."
        }
        Mode::Condensed => {
            "MODE: condensed\n\
             Keep only the key ideas, definitions and results. Aim for roughly half the \
             source length per page, and drop digressions and repeated examples."
        }
        Mode::Hybrid => {
            "MODE: hybrid\n\
             Keep the author's wording for core explanations and definitions. Simplify \
             asides, examples and background material into plain chunks."
        }
        Mode::InteractionHeavy => {
            "MODE: interaction-heavy\n\
             Use small chunks of one or two paragraphs and make nearly every chunk a \
             \"page.chunk\" with its own question. Plain chunks only for figures and tables."
        }
        Mode::Adaptive => {
            "MODE: adaptive\n\
             Choose per section: keep dense technical passages faithful, simplify \
             narrative or introductory passages, and condense repetitive material."
        }
    }
}

/// Example shown to the model when no reference JSON is supplied.
pub const BUILTIN_EXAMPLE: &str = r#"{
  "Title": "Introduction to Cells",
  "Description": "An adapted chapter on cell structure.",
  "VolumeSummary": "Cells are the basic unit of life; organelles divide the work.",
  "Pages": [
    {
      "Title": "Chloroplasts",
      "Order": 1,
      "ReferenceSummary": null,
      "Content": [
        {
          "__component": "page.chunk",
          "Header": "Structure of the chloroplast",
          "Text": "<p>Chloroplasts are enclosed by two membranes (see image_page_2_1).</p>",
          "Question": "What encloses a chloroplast?",
          "ConstructedResponse": "Two membranes, an outer and an inner one.",
          "KeyPhrase": "chloroplast, double membrane"
        },
        {
          "__component": "page.plain-chunk",
          "Header": "Did you know?",
          "Text": "<p>Chloroplasts have their own DNA.</p>"
        }
      ]
    }
  ]
}"#;

/// Everything a prompt is assembled from. All inputs are already loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptParams<'a> {
    pub mode: Mode,
    /// Authoring guide text (markdown or plain text).
    pub guide: Option<&'a str>,
    /// Reference example; [`BUILTIN_EXAMPLE`] is used when absent.
    pub example: Option<&'a Value>,
    /// Output of [`crate::pipeline::payload::build`]; the image section is
    /// omitted when `None` or empty.
    pub image_payload: Option<&'a str>,
    /// Verbatim source text, one entry per page.
    pub page_texts: &'a [String],
}

/// Assemble the user prompt. Pure: same parameters, same string.
pub fn build_prompt(params: &PromptParams<'_>) -> String {
    let mut sections: Vec<String> = Vec::new();

    sections.push(mode_instructions(params.mode).to_string());

    if let Some(guide) = params.guide.map(str::trim).filter(|g| !g.is_empty()) {
        sections.push(format!("INSTRUCTIONS:\n{guide}"));
    }

    let example = match params.example {
        Some(value) => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
        None => BUILTIN_EXAMPLE.to_string(),
    };
    sections.push(format!("REFERENCE OUTPUT EXAMPLE:\n```json\n{example}\n```"));

    if let Some(payload) = params.image_payload.filter(|p| !p.trim().is_empty()) {
        sections.push(format!(
            "IMAGE TAGS WITH COORDINATES:\n{payload}\n\n\
             Each <image> tag is a figure extracted from the PDF with its page position and \
             caption or nearby text. To place a figure, write its id prefixed with \"image_\" \
             (the tag id=\"page_2_1\" becomes image_page_2_1) inside the chunk \"Text\"."
        ));
    }

    if !params.page_texts.is_empty() {
        let mut source = String::from("SOURCE TEXT:");
        for (i, text) in params.page_texts.iter().enumerate() {
            source.push_str(&format!("\n\n--- Page {} ---\n{}", i + 1, text.trim()));
        }
        sections.push(source);
    }

    sections.push(
        "Convert the source into a volume JSON that follows the example schema and the \
         instructions above. Return only the JSON."
            .to_string(),
    );

    sections.join("\n\n")
}
