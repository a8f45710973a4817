use crate::errors::AurabotError;
use crate::llm::LlmClient;
use crate::reply::{ParsedReply, parse_reply};
use crate::transcript::Turn;
use tracing::{debug, error, info, warn};

/// Total completion attempts before giving up: the first call plus two
/// retries.
pub const MAX_ATTEMPTS: usize = 3;

/// Where the repair loop stands. Terminal states are `Succeeded` and
/// `ExhaustedRetries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairState {
    Attempting,
    Succeeded,
    ExhaustedRetries,
}

/// Drives completion calls until one yields an acceptable structured reply.
///
/// Every failure mode consumes one attempt from the same budget: undecodable
/// completions, shape violations, commands the caller refuses to accept, and
/// transport failures from the model call itself (a timed-out call is treated
/// like a completion that produced nothing parseable). After a model-side
/// failure the next call carries a corrective instruction describing what was
/// wrong.
///
/// On exhaustion the last error is returned as-is. No apology text is ever
/// fabricated for the user here; the caller logs the failure and stays
/// silent, which beats confidently sending something the model never said.
pub struct ReplyRepairCoordinator {
    max_attempts: usize,
}

impl Default for ReplyRepairCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyRepairCoordinator {
    pub fn new() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// Obtain a reply the caller is willing to act on. `accept` sees every
    /// structurally valid reply and may reject it with a typed error (e.g.
    /// an unsupported command type), which feeds the next corrective
    /// instruction.
    pub async fn obtain(
        &self,
        llm: &dyn LlmClient,
        transcript: &[Turn],
        system_instruction: &str,
        accept: impl Fn(&ParsedReply) -> Result<(), AurabotError>,
    ) -> Result<ParsedReply, AurabotError> {
        let mut correction: Option<String> = None;
        let mut last_error: Option<AurabotError> = None;

        for attempt in 1..=self.max_attempts {
            debug!(
                attempt,
                state = ?RepairState::Attempting,
                has_correction = correction.is_some(),
                "requesting completion"
            );

            let completion = match llm
                .complete(transcript, system_instruction, correction.as_deref())
                .await
            {
                Ok(text) => text,
                Err(e) => {
                    warn!(attempt, "completion call failed: {e}");
                    // The model never saw its own mistake, so there is
                    // nothing to correct on the next attempt.
                    correction = None;
                    last_error = Some(e);
                    continue;
                }
            };

            let reply = match parse_reply(&completion) {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(attempt, "completion did not parse: {e}");
                    correction = Some(correction_note(&e));
                    last_error = Some(e);
                    continue;
                }
            };

            if !reply.has_text() {
                warn!(attempt, "reply carried a command but no user text");
                let e = AurabotError::Validation(
                    "reply must include non-empty text alongside any command".to_string(),
                );
                correction = Some(correction_note(&e));
                last_error = Some(e);
                continue;
            }

            match accept(&reply) {
                Ok(()) => {
                    info!(
                        attempts = attempt,
                        state = ?RepairState::Succeeded,
                        has_command = reply.command.is_some(),
                        "structured reply obtained"
                    );
                    return Ok(reply);
                }
                Err(e) => {
                    warn!(attempt, "reply rejected: {e}");
                    correction = Some(correction_note(&e));
                    last_error = Some(e);
                }
            }
        }

        error!(
            attempts = self.max_attempts,
            state = ?RepairState::ExhaustedRetries,
            "no acceptable reply after all attempts"
        );
        Err(last_error.unwrap_or_else(|| {
            AurabotError::Parse("no completion was obtained".to_string())
        }))
    }
}

/// The instruction appended to the next completion call after a failure.
fn correction_note(error: &AurabotError) -> String {
    match error {
        AurabotError::Parse(_) => "Your previous reply could not be read. Respond with exactly \
                                   one JSON object containing a \"text\" field and an optional \
                                   \"command\" object. Escape line breaks inside string values \
                                   as \\n."
            .to_string(),
        AurabotError::UnknownCommand(detail) => format!(
            "Your previous reply used an unsupported command: {detail}. Reply again using only \
             the supported command types, or no command at all."
        ),
        _ => "Your previous reply was incomplete. You must include non-empty text alongside any \
              command, and a command must be a JSON object with a string \"type\" field."
            .to_string(),
    }
}
