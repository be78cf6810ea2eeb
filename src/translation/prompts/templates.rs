/*!
 * Prompt construction for batch translation.
 *
 * The prompt carries the instructions, the scene and previous batch
 * summaries as context, and the batch's lines in the line template.
 */

use std::collections::BTreeMap;

use crate::subtitles::SubtitleLine;
use crate::translation::formatting::format_lines;

/// Instructions template with `{source_language}` and `{target_language}` placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// The template string with placeholders
    template: String,
}

impl PromptTemplate {
    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Render the template with the given languages.
    pub fn render(&self, source_language: &str, target_language: &str) -> String {
        self.template
            .replace("{source_language}", source_language)
            .replace("{target_language}", target_language)
    }
}

/// A request for one batch, as handed to a translation backend.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationPrompt {
    /// Rendered instructions
    pub instructions: String,

    /// Request body: context followed by the formatted lines
    pub user: String,

    /// Source lines being translated
    pub lines: Vec<SubtitleLine>,
}

/// Builder for constructing translation prompts with context.
#[derive(Debug, Clone)]
pub struct TranslationPromptBuilder {
    source_language: String,
    target_language: String,
    template: Option<PromptTemplate>,
    scene_summary: Option<String>,
    batch_summaries: Vec<String>,
    max_summaries: usize,
    context: BTreeMap<String, String>,
    lines: Vec<SubtitleLine>,
}

impl TranslationPromptBuilder {
    /// Create a new prompt builder.
    pub fn new(source_language: &str, target_language: &str) -> Self {
        Self {
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            template: None,
            scene_summary: None,
            batch_summaries: Vec::new(),
            max_summaries: usize::MAX,
            context: BTreeMap::new(),
            lines: Vec::new(),
        }
    }

    /// Set the instructions template.
    pub fn with_instructions(mut self, template: &str) -> Self {
        self.template = Some(PromptTemplate::new(template));
        self
    }

    /// Set the summary of the scene the batch belongs to.
    pub fn with_scene_summary(mut self, summary: Option<&str>) -> Self {
        self.scene_summary = summary.filter(|s| !s.trim().is_empty()).map(str::to_string);
        self
    }

    /// Add summaries of the preceding batches, oldest first.
    pub fn with_batch_summaries<I, S>(mut self, summaries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.batch_summaries = summaries
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| !s.trim().is_empty())
            .collect();
        self
    }

    /// Keep at most this many of the most recent batch summaries.
    pub fn with_max_summaries(mut self, max: usize) -> Self {
        self.max_summaries = max;
        self
    }

    /// Add free-form context entries.
    pub fn with_context(mut self, context: &BTreeMap<String, String>) -> Self {
        self.context.extend(context.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Set the lines to translate.
    pub fn with_lines(mut self, lines: &[SubtitleLine]) -> Self {
        self.lines = lines.to_vec();
        self
    }

    /// Build the instructions.
    pub fn build_instructions(&self) -> String {
        match &self.template {
            Some(template) => template.render(&self.source_language, &self.target_language),
            None => format!(
                "Translate the following subtitles from {} to {}.",
                self.source_language, self.target_language
            ),
        }
    }

    /// Build the request body.
    pub fn build_user_prompt(&self) -> String {
        let mut sections = Vec::new();

        let skip = self.batch_summaries.len().saturating_sub(self.max_summaries);
        let mut context = Vec::new();
        if let Some(scene) = &self.scene_summary {
            context.push(format!("<scene>{}</scene>", scene));
        }
        for summary in self.batch_summaries.iter().skip(skip) {
            context.push(format!("<summary>{}</summary>", summary));
        }
        for (key, value) in &self.context {
            context.push(format!("<{key}>{value}</{key}>"));
        }
        if !context.is_empty() {
            sections.push(format!("<context>\n{}\n</context>", context.join("\n")));
        }

        sections.push(format!(
            "Please translate these subtitles to {}:",
            self.target_language
        ));
        sections.push(format_lines(&self.lines));
        sections.join("\n\n")
    }

    /// Build the prompt.
    pub fn build(&self) -> TranslationPrompt {
        TranslationPrompt {
            instructions: self.build_instructions(),
            user: self.build_user_prompt(),
            lines: self.lines.clone(),
        }
    }
}
