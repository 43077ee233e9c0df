//! Prompt templates for report synthesis and revision.
//!
//! Each function renders one generation call's prompt. Retrieved context is
//! passed in pre-formatted (see `learning_harness_core::report::format_context`).

use learning_harness_core::models::Preferences;

/// Focus text used when the learner named no focus area.
pub const DEFAULT_FOCUS: &str = "general understanding";

/// Marker the extraction prompt asks for when nothing is relevant.
pub const NO_OUTPUT: &str = "NO_OUTPUT";

pub fn focus(preferences: &Preferences) -> &str {
    preferences.focus_area.as_deref().unwrap_or(DEFAULT_FOCUS)
}

pub fn overview(topic: &str, context: &str) -> String {
    format!(
        "Create a comprehensive overview of {topic} based on this research:\n\n{context}"
    )
}

pub fn objectives(topic: &str, knowledge_level: &str, focus: &str) -> String {
    format!(
        "Create 3-5 clear learning objectives for {topic} at a {knowledge_level} level, \
         focusing on {focus}. Format them as a markdown bullet list."
    )
}

pub fn key_concepts(topic: &str, knowledge_level: &str, context: &str) -> String {
    format!(
        "List and briefly explain 5-7 key concepts in {topic} suitable for a {knowledge_level} \
         level, based on:\n\n{context}"
    )
}

pub fn section_plan(topic: &str, focus: &str) -> String {
    format!(
        "List 3-5 important subtopics or sections for learning about {topic}, focusing on \
         {focus}. Return only the section titles separated by commas."
    )
}

pub fn section(topic: &str, title: &str, preferences: &Preferences, context: &str) -> String {
    format!(
        r#"You are creating an educational section for a learning report on {topic}.
The user has the following preferences:
- Knowledge level: {level}
- Preferred depth: Level {depth} (1=basic, 3=advanced)
- Focus areas: {focus}
- Available study time: about {minutes} minutes for the whole report

Based on these research documents:
{context}

Create a detailed and informative section about: {title}
Make sure to:
1. Use clear explanations appropriate for the user's knowledge level
2. Include specific examples and applications
3. Reference sources where appropriate using footnotes [1] style
4. Use markdown formatting for headings, bullet points, etc.
5. Don't exceed the appropriate depth level for this user

Section:"#,
        level = preferences.knowledge_level(),
        depth = preferences.depth_level,
        focus = focus(preferences),
        minutes = preferences.session_time_minutes,
    )
}

pub fn visual(topic: &str, concept: &str, knowledge_level: &str, context: &str) -> String {
    format!(
        r#"Based on the following content about {topic}:
{context}

Create a text description of a diagram that would help visualize the concept of {concept}.
The diagram should be clear and educational, suitable for a {knowledge_level} level learner.
Use markdown to describe what the diagram should show. Include labels, arrows, and components that should be included.

Diagram Description:"#
    )
}

pub fn language(topic: &str) -> String {
    format!(
        "What would be the most appropriate programming language to demonstrate concepts in \
         {topic}? Answer with just the language name (e.g., 'Python', 'JavaScript')."
    )
}

pub fn code_example(
    topic: &str,
    concept: &str,
    knowledge_level: &str,
    language: &str,
    context: &str,
) -> String {
    format!(
        r#"Create a practical code example that demonstrates {concept} in {topic}.
This should be suitable for someone with {knowledge_level} knowledge level.
Based on the following information:
{context}

The code should:
1. Be well-commented to explain what each section does
2. Be complete enough to demonstrate the concept clearly
3. Include sample output if applicable
4. Use best practices

```{language}
# Your code here
```

Explanation:"#
    )
}

pub fn assessment(topic: &str, knowledge_level: &str, context: &str) -> String {
    format!(
        r#"Create 3-5 assessment questions to help the learner check their understanding of {topic}.
The questions should be suitable for someone with {knowledge_level} knowledge level.
Based on the following materials:
{context}

Include a mix of question types (multiple choice, short answer, etc.)
Provide answers or solution hints after each question.
Format everything with clear markdown."#
    )
}

pub fn resources(topic: &str, knowledge_level: &str, include_videos: bool, context: &str) -> String {
    let video_note = if include_videos {
        "\nThe learner prefers video content: favour video lectures and tutorials where possible.\n"
    } else {
        ""
    };
    format!(
        r#"Based on the research materials:
{context}

Create a list of 3-5 additional learning resources for someone interested in {topic}.
The person has a {knowledge_level} level of familiarity with the subject.{video_note}
For each resource, include:
1. The title/name
2. A brief description (1-2 sentences)
3. Why it's valuable for further learning
4. Type of resource (book, course, video, etc.)

Format using markdown with clear headings and bullet points."#
    )
}

/// Extraction prompt used to compress a retrieved chunk against its query.
pub fn extract_relevant(query: &str, chunk_text: &str) -> String {
    format!(
        r#"Given the following question and context, extract any part of the context *AS IS* that is relevant to answer the question. If none of the context is relevant return {NO_OUTPUT}.

Remember, *DO NOT* edit the extracted parts of the context.

> Question: {query}
> Context:
>>>
{chunk_text}
>>>
Extracted relevant parts:"#
    )
}

pub fn feedback_analysis(feedback: &str) -> String {
    format!(
        "Analyze this feedback for a learning report: {feedback}\n\n\
         Identify specific aspects that need modification and what changes are requested. \
         Format your response as a JSON object with keys 'aspects' (array of sections to modify) \
         and 'requests' (array of requested changes)."
    )
}

pub fn revision(
    feedback: &str,
    analysis: &str,
    context: &str,
    previous_report: Option<&str>,
) -> String {
    let previous = match previous_report {
        Some(report) => format!("\nThe current version of the report is:\n\n{report}\n"),
        None => String::new(),
    };
    format!(
        r#"Based on this user feedback:
{feedback}

Analysis of the requested changes:
{analysis}

And these relevant research materials:
{context}
{previous}
Create an updated version of the learning report.
Make specific improvements addressing the feedback while maintaining the overall structure and quality of the report.
Format the response as complete markdown document suitable for educational purposes."#
    )
}
