//! Integration tests for sending messages through a chat session

mod test_utils;

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::{Duration, Instant};

    use ctxchat::anthropic::{AnthropicClient, Role as WireRole};
    use ctxchat::chat::{ChatBuilder, NewChat, Role, SendOutcome, Turn};

    use crate::test_utils::{RecordingClient, request_texts, session_with_turns};

    /// With five turns and a window of three only the last three go
    /// out, and the window slides forward as the conversation grows
    #[tokio::test]
    async fn it_sends_only_the_context_window() {
        let client = RecordingClient::replying("ok");
        let mut session = session_with_turns(&client, 5);
        session.set_window_size("3");

        let flags: Vec<bool> = session.view().turns.iter().map(|t| t.in_context).collect();
        assert_eq!(flags, vec![false, false, true, true, true]);

        assert_eq!(session.send("turn 5").await, SendOutcome::Replied);
        assert_eq!(
            request_texts(&client.last_request()),
            vec!["turn 2", "turn 3", "turn 4", "turn 5"]
        );

        // Seven turns now, so indices 4..7 are in context
        let view = session.view();
        assert_eq!(view.turns.len(), 7);
        assert_eq!(view.context_start, 4);
        assert_eq!(session.transcript().get(6).unwrap().display_content, "ok");
    }

    /// Recomputing after a single append (without a reply yet) moves
    /// the window by one
    #[tokio::test]
    async fn it_recomputes_membership_from_transcript_length() {
        let client = RecordingClient::failing();
        let mut session = session_with_turns(&client, 5);
        session.set_window_size("3");
        assert_eq!(session.view().context_start, 2);

        session.set_max_tokens("zero");
        session.send("turn 5").await;

        // User turn and diagnostic were appended
        assert_eq!(session.transcript().length(), 7);
        assert_eq!(session.view().context_start, 4);
    }

    /// A window of zero sends only the new message
    #[tokio::test]
    async fn it_sends_no_history_with_window_zero() {
        let client = RecordingClient::replying("ok");
        let mut session = session_with_turns(&client, 4);
        session.set_window_size("0");

        session.send("just this").await;

        assert_eq!(request_texts(&client.last_request()), vec!["just this"]);
        assert!(session.view().turns.iter().all(|t| !t.in_context));
    }

    /// Changing the window never touches the transcript
    #[test]
    fn it_changes_window_without_mutating_transcript() {
        let client = RecordingClient::replying("ok");
        let mut session = session_with_turns(&client, 6);
        let before = session.transcript().turns().to_vec();

        for size in ["0", "2", "100", "-3"] {
            assert!(session.set_window_size(size));
            assert_eq!(session.transcript().turns(), before.as_slice());
        }
        assert_eq!(session.config().window_size, 0);
    }

    /// Edits to an in-context turn change what is sent next, edits to
    /// an out-of-context turn do not show up at all
    #[tokio::test]
    async fn it_sends_edited_content_only_when_in_context() {
        let client = RecordingClient::replying("ok");
        let mut session = session_with_turns(&client, 4);
        session.set_window_size("2");

        session.edit(3, "edited recent");
        session.edit(0, "edited old");
        session.send("next").await;

        let texts = request_texts(&client.last_request());
        assert_eq!(texts, vec!["turn 2", "edited recent", "next"]);
        assert!(!texts.contains(&"edited old".to_string()));

        // The original text is still what was appended
        assert_eq!(session.transcript().get(3).unwrap().content, "turn 3");
    }

    /// Edits bound to a handle from before a reset are dropped
    #[tokio::test]
    async fn it_ignores_stale_edit_handles() {
        let client = RecordingClient::replying("ok");
        let mut session = session_with_turns(&client, 2);
        let handle = session.view().turns[1].handle;

        let t0 = Instant::now();
        session.request_new_chat(t0);
        session.request_new_chat(t0 + Duration::from_millis(100));
        session.send("fresh").await;

        assert!(!session.edit_turn(handle, "stale"));
        assert_eq!(session.transcript().get(1).unwrap().display_content, "ok");
    }

    /// Out of range edits are a no-op
    #[test]
    fn it_ignores_out_of_range_edits() {
        let client = RecordingClient::replying("ok");
        let mut session = session_with_turns(&client, 3);

        session.edit(3, "nope");
        session.edit(usize::MAX, "nope");

        assert_eq!(session.transcript().length(), 3);
        assert!(session.transcript().iter().all(|t| !t.is_edited()));
    }

    /// A bad temperature keeps the user turn, adds one diagnostic and
    /// never calls the model
    #[tokio::test]
    async fn it_reports_invalid_settings_without_calling_the_model() {
        let client = RecordingClient::replying("ok");
        let mut session = session_with_turns(&client, 2);
        session.set_temperature("abc");

        assert_eq!(session.send("hello").await, SendOutcome::Failed);

        assert_eq!(client.calls(), 0);
        let turns = session.transcript().turns();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[2].role, Role::User);
        assert_eq!(turns[2].content, "hello");
        assert_eq!(turns[3].role, Role::System);
        assert!(turns[3].content.contains("abc"));

        // Fixing the value and resending works
        session.set_temperature("0.4");
        assert_eq!(session.send("hello").await, SendOutcome::Replied);
        assert_eq!(client.last_request().temperature, 0.4);
    }

    /// Remote failures become a diagnostic and the user turn stays
    #[tokio::test]
    async fn it_surfaces_remote_errors_as_system_turns() {
        let client = RecordingClient::failing();
        let mut session = session_with_turns(&client, 0);

        assert_eq!(session.send("hello").await, SendOutcome::Failed);

        assert_eq!(client.calls(), 1);
        let turns = session.transcript().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::System);
        assert!(turns[1].content.contains("overloaded"));
    }

    /// Diagnostics sit in the window but are never sent to the model
    #[tokio::test]
    async fn it_never_sends_diagnostic_turns() {
        let client = RecordingClient::replying("ok");
        let mut session = session_with_turns(&client, 2);
        session.set_window_size("bogus");
        session.send("next").await;

        let request = client.last_request();
        assert_eq!(request_texts(&request), vec!["turn 0", "turn 1", "next"]);
        assert_eq!(request.messages[0].role, WireRole::User);
        assert_eq!(request.messages[1].role, WireRole::Assistant);
    }

    /// The system prompt goes out only when it has content, along with
    /// the sampling settings
    #[tokio::test]
    async fn it_passes_system_prompt_and_sampling() {
        let client = RecordingClient::replying("ok");
        let mut session = session_with_turns(&client, 0);

        session.send("first").await;
        let request = client.last_request();
        assert_eq!(request.system, None);
        assert_eq!(request.max_tokens, 1024);
        assert_eq!(request.temperature, 1.0);
        assert_eq!(request.model, "claude-test");

        session.set_system_prompt("  Reply in haiku.  ");
        session.set_max_tokens("300");
        session.send("second").await;
        let request = client.last_request();
        assert_eq!(request.system, Some("Reply in haiku.".to_string()));
        assert_eq!(request.max_tokens, 300);
    }

    /// The attachment rides on the newest turn only and never lands in
    /// the transcript
    #[tokio::test]
    async fn it_attaches_pdf_to_newest_turn_only() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("doc.pdf");
        fs::write(&pdf, b"%PDF-1.4 test").unwrap();

        let client = RecordingClient::replying("ok");
        let mut session = session_with_turns(&client, 0);
        assert!(session.attach(&pdf));

        session.send("summarize").await;
        assert_eq!(
            request_texts(&client.last_request()),
            vec!["<pdf>+summarize"]
        );
        assert_eq!(session.transcript().get(0).unwrap().content, "summarize");

        session.send("and again").await;
        assert_eq!(
            request_texts(&client.last_request()),
            vec!["summarize", "ok", "<pdf>+and again"]
        );

        session.clear_attachment();
        session.send("plain").await;
        let texts = request_texts(&client.last_request());
        assert!(texts.iter().all(|t| !t.contains("<pdf>")));
    }

    /// A missing attachment file is reported and nothing is attached
    #[test]
    fn it_reports_missing_attachment() {
        let client = RecordingClient::replying("ok");
        let mut session = session_with_turns(&client, 0);

        assert!(!session.attach(std::path::Path::new("/no/such/file.pdf")));
        assert!(session.config().attachment.is_none());
        assert_eq!(session.transcript().get(0).unwrap().role, Role::System);
    }

    /// Without an API key every send is just a diagnostic
    #[tokio::test]
    async fn it_refuses_to_send_without_a_client() {
        let mut session = ChatBuilder::new("claude-test").build();
        assert_eq!(session.transcript().length(), 1);

        session.send("hello").await;
        session.send("anyone?").await;

        let turns = session.transcript().turns();
        assert_eq!(turns.len(), 3);
        assert!(turns.iter().all(|t| t.role == Role::System));
    }

    /// New chat needs two presses inside the timeout
    #[tokio::test]
    async fn it_requires_confirmation_for_new_chat() {
        let client = RecordingClient::replying("ok");
        let mut session = ChatBuilder::new("claude-test")
            .client(Box::new(client.clone()))
            .confirm_timeout(Duration::from_secs(2))
            .build();
        session.send("hello").await;

        let t0 = Instant::now();
        assert_eq!(session.request_new_chat(t0), NewChat::Armed);
        assert_eq!(
            session.request_new_chat(t0 + Duration::from_secs(5)),
            NewChat::Armed
        );
        assert_eq!(session.transcript().length(), 2);

        assert_eq!(
            session.request_new_chat(t0 + Duration::from_secs(6)),
            NewChat::Reset
        );
        assert_eq!(session.transcript().length(), 0);
    }

    /// End to end against a mock Messages API
    #[tokio::test]
    async fn it_talks_to_the_messages_api() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "claude-test",
                "messages": [
                    {"role": "assistant", "content": "turn 1"},
                    {"role": "user", "content": "hi"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id":"msg_1","type":"message","role":"assistant","content":[{"type":"text","text":"A"},{"type":"text","text":"B"}]}"#,
            )
            .create();

        let mut session = ChatBuilder::new("claude-test")
            .client(Box::new(AnthropicClient::new(&server.url(), "test-key")))
            .transcript(vec![
                Turn::new(Role::User, "turn 0"),
                Turn::new(Role::Assistant, "turn 1"),
            ])
            .build();
        session.set_window_size("1");

        assert_eq!(session.send("hi").await, SendOutcome::Replied);

        mock.assert();
        assert_eq!(session.transcript().get(3).unwrap().content, "A B");
    }
}
