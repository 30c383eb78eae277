use chrono::{TimeZone, Utc};

use intake_spec::{
    Answer, AnswerStore, FileAttachment, FormSpec, ReportContext, export_filename, generate,
    generate_with,
};

fn fixture() -> FormSpec {
    FormSpec::from_json_str(include_str!("fixtures/brand_discovery.json")).expect("fixture")
}

fn answer(spec: &FormSpec, store: &mut AnswerStore, id: &str, value: Answer) {
    let question = spec.question(id).expect("question");
    store.set(question, value).expect("answer");
}

fn fixed_context() -> ReportContext {
    let at = Utc.with_ymd_and_hms(2026, 10, 18, 14, 30, 0).unwrap();
    ReportContext::at(at, at)
}

#[test]
fn unanswered_questions_are_omitted_in_declaration_order() {
    let spec = fixture();
    let mut store = AnswerStore::new();
    answer(&spec, &mut store, "story", Answer::text("We started small."));
    answer(&spec, &mut store, "company_name", Answer::text("Acme"));
    answer(&spec, &mut store, "phone", Answer::text("   "));

    let doc = generate_with(&spec, &store, &fixed_context());

    let company = doc.find("## Company name").expect("company heading");
    let story = doc.find("## Tell us your story").expect("story heading");
    assert!(company < story);
    assert!(!doc.contains("## Phone number"));
    assert!(!doc.contains("## Email address"));
    assert!(doc.contains("## Tell us your story\n\nWe started small.\n\n"));
    assert!(doc.starts_with("# Brand Discovery\n\n**Submitted:** 2026-10-18 at 14:30:00\n\n---\n\n"));
    assert!(doc.ends_with("---\n\n*Generated by Brand Discovery on 2026-10-18*"));
}

#[test]
fn empty_store_still_has_skeleton() {
    let spec = fixture();
    let doc = generate_with(&spec, &AnswerStore::new(), &fixed_context());
    assert_eq!(
        doc,
        "# Brand Discovery\n\n\
         **Submitted:** 2026-10-18 at 14:30:00\n\n\
         ---\n\n\
         ---\n\n\
         *Generated by Brand Discovery on 2026-10-18*"
    );
}

#[test]
fn timestamp_line_follows_output_option() {
    let mut spec = fixture();
    spec.output.include_timestamp = false;
    let doc = generate_with(&spec, &AnswerStore::new(), &fixed_context());
    assert!(!doc.contains("**Submitted:**"));
    assert!(doc.starts_with("# Brand Discovery\n\n---\n\n"));
}

#[test]
fn lists_render_as_bullets() {
    let spec = fixture();
    let mut store = AnswerStore::new();
    answer(
        &spec,
        &mut store,
        "personality",
        Answer::list(["bold", " ", "premium"]),
    );
    let doc = generate_with(&spec, &store, &fixed_context());
    assert!(doc.contains("## Which words describe your brand?\n\n- bold\n- premium\n\n"));
}

#[test]
fn empty_list_is_omitted() {
    let spec = fixture();
    let mut store = AnswerStore::new();
    answer(&spec, &mut store, "personality", Answer::list(Vec::<String>::new()));
    let doc = generate_with(&spec, &store, &fixed_context());
    assert!(!doc.contains("Which words"));
}

#[test]
fn structured_answers_follow_declared_field_order() {
    let spec = fixture();
    let mut store = AnswerStore::new();
    answer(
        &spec,
        &mut store,
        "contact",
        Answer::fields([("Notes", ""), ("Role", "Founder"), ("Name", "Ada")]),
    );
    let doc = generate_with(&spec, &store, &fixed_context());
    assert!(doc.contains("## Primary contact\n\n**Name:** Ada\n**Role:** Founder\n\n"));
    assert!(!doc.contains("**Notes:**"));
}

#[test]
fn structured_answer_with_only_blank_fields_is_omitted() {
    let spec = fixture();
    let mut store = AnswerStore::new();
    answer(
        &spec,
        &mut store,
        "contact",
        Answer::fields([("Name", "  "), ("Role", "")]),
    );
    let doc = generate_with(&spec, &store, &fixed_context());
    assert!(!doc.contains("Primary contact"));
}

#[test]
fn other_choice_shows_typed_text() {
    let spec = fixture();
    let mut store = AnswerStore::new();
    let industry = spec.question("industry").unwrap();
    store.set(industry, Answer::text("other")).unwrap();
    store.set_other(industry, "Aerospace").unwrap();
    let doc = generate_with(&spec, &store, &fixed_context());
    assert!(doc.contains("## Industry\n\n**Other: Aerospace**\n\n"));
}

#[test]
fn hidden_but_answered_questions_are_still_reported() {
    let spec = fixture();
    let mut store = AnswerStore::new();
    let assets = spec.question("brand_assets").unwrap();
    store
        .add_file(
            assets,
            FileAttachment::new("logo.svg", "image/svg+xml", vec![0; 2048]),
        )
        .unwrap();
    answer(&spec, &mut store, "has_brand", Answer::text("no"));

    let doc = generate_with(&spec, &store, &fixed_context());
    assert!(doc.contains("## Upload your existing brand assets\n\n- logo.svg (2.0 KB)\n\n"));
}

#[test]
fn report_is_stable_apart_from_footer_date() {
    let spec = fixture();
    let mut store = AnswerStore::new();
    answer(&spec, &mut store, "company_name", Answer::text("Acme"));
    answer(&spec, &mut store, "personality", Answer::list(["bold"]));

    let submitted = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();
    let first = generate_with(&spec, &store, &ReportContext::at(submitted, submitted));
    let later = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();
    let second = generate_with(&spec, &store, &ReportContext::at(submitted, later));

    let body = |doc: &str| {
        doc.rsplit_once('\n')
            .map(|(head, _)| head.to_string())
            .unwrap_or_default()
    };
    assert_eq!(body(&first), body(&second));
    assert_ne!(first, second);
}

#[test]
fn repeated_generation_keeps_submission_line() {
    let spec = fixture();
    let mut store = AnswerStore::new();
    answer(&spec, &mut store, "company_name", Answer::text("Acme"));

    let submitted = Utc.with_ymd_and_hms(2026, 10, 18, 10, 41, 57).unwrap();
    let first = generate(&spec, &store, submitted);
    std::thread::sleep(std::time::Duration::from_millis(1100));
    let second = generate(&spec, &store, submitted);

    assert!(first.contains("**Submitted:** 2026-10-18 at 10:41:57\n\n"));
    let body = |doc: &str| {
        doc.rsplit_once('\n')
            .map(|(head, _)| head.to_string())
            .unwrap_or_default()
    };
    assert_eq!(body(&first), body(&second));
}

#[test]
fn filename_uses_configured_prefix_and_date() {
    let spec = fixture();
    let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    assert_eq!(export_filename(&spec, at), "brand-discovery-2026-01-02.md");
}
