use {
    anyhow::Result,
    async_trait::async_trait,
    botwire_common::{Activity, ChannelType, LifecyclePoint, Middleware, Next},
    tracing::debug,
};

#[cfg(feature = "metrics")]
use botwire_metrics::{counter, directline as dl_metrics};

/// Content type of prompt keyboards (choice buttons).
pub const KEYBOARD_CONTENT_TYPE: &str = "application/vnd.microsoft.keyboard";

/// Move the prompt keyboard of an outbound Direct Line message into
/// `sourceEvent.choices`.
///
/// The public attachment list is truncated from the first keyboard onwards;
/// the keyboard itself becomes `choices` and any attachments that followed
/// it are dropped. An existing `sourceEvent` is merged into rather than
/// replaced: only `choices` is overwritten, every other key is kept. Returns the
/// number of attachments removed from the public list, or `None` when the
/// activity was left untouched.
pub fn relocate_choices(activity: &mut Activity) -> Option<usize> {
    if !activity.is_message() || ChannelType::of(activity) != Some(ChannelType::DirectLine) {
        return None;
    }

    let index = activity
        .attachments
        .iter()
        .position(|a| a.content_type == KEYBOARD_CONTENT_TYPE)?;

    let removed = activity.attachments.split_off(index);
    let count = removed.len();
    activity.source_event_mut().choices = removed.into_iter().next();
    Some(count)
}

/// Outbound middleware applying [`relocate_choices`].
#[derive(Debug, Default)]
pub struct DirectLinePrompts;

impl DirectLinePrompts {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for DirectLinePrompts {
    fn name(&self) -> &str {
        "directline-prompts"
    }

    fn points(&self) -> &[LifecyclePoint] {
        &[LifecyclePoint::Send]
    }

    async fn handle(
        &self,
        _point: LifecyclePoint,
        activity: &mut Activity,
        next: Next<'_>,
    ) -> Result<()> {
        if let Some(removed) = relocate_choices(activity) {
            debug!(
                removed,
                remaining = activity.attachments.len(),
                "moved keyboard attachment to sourceEvent.choices"
            );
            #[cfg(feature = "metrics")]
            counter!(dl_metrics::CHOICES_RELOCATED_TOTAL).increment(1);
        }
        next.run(activity).await
    }
}
