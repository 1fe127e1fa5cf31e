//! Prompts for LLM-driven question extraction.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: the JSON contract the parser relies on
//!    (field names, null conventions, the `questions` envelope) is spelled
//!    out in exactly one place.
//!
//! 2. **Testability**: unit tests can inspect the built prompts directly
//!    without calling a model, so contract drift between prompt and parser
//!    shows up as a test failure.
//!
//! The bounding-box instructions are deliberately loud. Vision models love
//! returning normalized or 1000-range coordinates, and a wrong coordinate
//! space silently produces garbage crops rather than errors.

/// System prompt for bulk-text extraction.
pub const TEXT_SYSTEM_PROMPT: &str = "You are a professional exam-question analyst, \
skilled at extracting structured question data from text.";

/// System prompt for single-image extraction.
pub const IMAGE_SYSTEM_PROMPT: &str = "You are a professional exam-question analyst, \
skilled at recognising and extracting question data from images.";

/// System prompt for whole-page extraction with figure-region detection.
pub const PAGE_VISION_SYSTEM_PROMPT: &str = "You are a professional exam-question analyst, \
skilled at identifying questions and figure regions in exam-paper images.";

/// The envelope shape shared by the text and single-image prompts.
const QUESTION_SCHEMA: &str = r#"Return format:
{
    "questions": [
        {
            "question_text": "the question stem",
            "question_type": "single_choice/multiple_choice",
            "options": [
                {"key": "A", "text": "option text", "is_correct": null},
                {"key": "B", "text": "option text", "is_correct": null}
            ],
            "correct_answer": null,
            "explanation": null,
            "tags": {
                "company": ["company name"],
                "question_type": ["verbal comprehension/numerical reasoning/figure reasoning/..."],
                "subject": ["related subject"],
                "skill": ["specific skill"]
            },
            "difficulty": "easy/medium/hard"
        }
    ]
}"#;

const TEXT_PROMPT_RULES: &str = r#"Important:
1. question_type must be "single_choice" or "multiple_choice"
2. If the text states the answer:
   - set is_correct to true or false on each option
   - set correct_answer to the answer (e.g. "A" or "ABC")
3. If the text does not state the answer:
   - set is_correct to null on every option (unknown)
   - set correct_answer to null
4. If the text provides an explanation, set the explanation field
5. If it does not, set explanation to null

Requirements:
1. Identify question boundaries accurately
2. Extract every option
3. Infer appropriate tags from the content
4. Assess question difficulty
5. The output must be valid JSON"#;

const IMAGE_PROMPT_RULES: &str = r#"Rules:
- question_type: only "single_choice" or "multiple_choice"
- If the image states the answer, set is_correct and correct_answer
- If the image does not state the answer, set both is_correct and correct_answer to null
- If the image provides an explanation, set explanation; otherwise null

Notes:
1. If the image contains figures or charts, record that in tags
2. Extract as much of the text in the image as possible
3. The output must be valid JSON"#;

const PAGE_PROMPT_BODY: &str = r#"Return format:
{
    "questions": [
        {
            "question_text": "the question text",
            "question_type": "single_choice/multiple_choice",
            "has_figure": true/false,
            "figure_description": "what the figure shows (e.g. flowchart, geometric drawing)",
            "figure_bbox": [x1, y1, x2, y2],
            "options": [
                {
                    "key": "A",
                    "text": "option text",
                    "has_figure": false,
                    "figure_bbox": null
                },
                {
                    "key": "B",
                    "text": "option text",
                    "has_figure": true,
                    "figure_bbox": [x1, y1, x2, y2]
                }
            ],
            "correct_answer": null,
            "explanation": null,
            "tags": {
                "company": [],
                "question_type": [],
                "subject": [],
                "skill": []
            },
            "difficulty": "easy/medium/hard"
        }
    ]
}

Important:
1. has_figure: set true only when the question or option contains a real
   figure (chart, geometric drawing, flowchart and the like). Pure text
   content is false.

2. figure_bbox coordinates (critical):
   - Format: [top-left x, top-left y, bottom-right x, bottom-right y]
   - Use absolute pixel coordinates, never normalized coordinates!
   - Measure from the top-left corner (0, 0) of the image
   - Example: if the image is 1600px wide and 1200px tall and the figure
     sits between (400, 300) and (800, 600), return [400, 300, 800, 600]
   - Do NOT return normalized values like [0.25, 0.25, 0.5, 0.5]
   - Do NOT return 1000-range values like [250, 250, 500, 500]
   - Use null when there is no figure
   - Frame the figure region precisely; a margin of 10-20 pixels is fine

3. question_type must be "single_choice" or "multiple_choice"

4. Answers: if the page states the answer, set correct_answer; if not,
   set it to null

5. Option figures: when an option itself is an image (figure-choice
   questions), set has_figure=true and the matching figure_bbox on that
   option

6. JSON format requirements (very important!):
   - Return the complete JSON with every question on the page
   - No comments (// ...) and no ellipses (...)
   - Do not simplify or skip any question
   - If the page has 9 questions, return all 9, not a subset
   - The output must parse with a standard JSON parser

Analyse the image carefully and extract every question on the page with
nothing omitted. Return complete, valid JSON containing all questions,
without comments or ellipsis markers."#;

/// Build the user prompt for bulk-text extraction.
pub fn text_extraction_prompt(text: &str) -> String {
    format!(
        "Extract every exam question from the following text and return the result as JSON.\n\n\
         Text content:\n{}\n\n{}\n\n{}",
        text, QUESTION_SCHEMA, TEXT_PROMPT_RULES
    )
}

/// Build the user prompt for single-image extraction, with optional
/// surrounding-text context.
pub fn image_extraction_prompt(context: Option<&str>) -> String {
    let mut prompt = String::from(
        "Analyse the question content in this image and extract it as structured JSON.\n\n",
    );
    if let Some(ctx) = context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!("Context: {}\n\n", ctx));
    }
    prompt.push_str(QUESTION_SCHEMA);
    prompt.push_str("\n\n");
    prompt.push_str(IMAGE_PROMPT_RULES);
    prompt
}

/// Build the user prompt for whole-page extraction with figure regions.
pub fn page_vision_prompt(page_number: u32) -> String {
    format!(
        "You are analysing page {} of an exam paper. Identify and extract every question.\n\n{}",
        page_number, PAGE_PROMPT_BODY
    )
}
