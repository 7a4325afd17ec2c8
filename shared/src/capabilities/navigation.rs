use crux_core::capability::{Capability, CapabilityContext, Operation};

use crate::model::NavigationIntent;

impl Operation for NavigationIntent {
    type Output = ();
}

/// Fire-and-forget navigation requests. The shell never answers.
pub struct Navigation<E> {
    context: CapabilityContext<NavigationIntent, E>,
}

impl<Ev> Capability<Ev> for Navigation<Ev> {
    type Operation = NavigationIntent;
    type MappedSelf<MappedEv> = Navigation<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static,
    {
        Navigation::new(self.context.map_event(f))
    }
}

impl<E> Navigation<E>
where
    E: 'static,
{
    pub fn new(context: CapabilityContext<NavigationIntent, E>) -> Self {
        Self { context }
    }

    pub fn navigate(&self, intent: NavigationIntent) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(intent).await;
        });
    }
}
