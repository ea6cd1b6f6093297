//! In-process `MarketDataSource` whose behaviour can be switched mid-test.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use coinpulse_core::{
    CanonicalCoin, CapabilitySet, CoinsQuery, GlobalMarketSnapshot, MarketDataSource,
    ProviderConfig, ProviderError, ProviderErrorKind, ProviderId, SourceFuture, SourceRegistry,
    TrendingCoin, TrendingList,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Healthy,
    Failing,
    Empty,
    Slow(Duration),
    /// Unwinds on the first poll of the returned future.
    Panicking,
}

pub struct ScriptedSource {
    id: ProviderId,
    capabilities: CapabilitySet,
    behaviour: Mutex<Behaviour>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(id: ProviderId, behaviour: Behaviour) -> Arc<Self> {
        Self::with_capabilities(id, behaviour, CapabilitySet::full())
    }

    pub fn with_capabilities(
        id: ProviderId,
        behaviour: Behaviour,
        capabilities: CapabilitySet,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            capabilities,
            behaviour: Mutex::new(behaviour),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_behaviour(&self, behaviour: Behaviour) {
        *self.behaviour.lock().expect("not poisoned") = behaviour;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn behaviour(&self) -> Behaviour {
        *self.behaviour.lock().expect("not poisoned")
    }

    fn answer<T: Send + 'static>(&self, full: T, empty: T) -> SourceFuture<'_, T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let id = self.id;
        match self.behaviour() {
            Behaviour::Healthy => Box::pin(async move { Ok(full) }),
            Behaviour::Empty => Box::pin(async move { Ok(empty) }),
            Behaviour::Failing => Box::pin(async move {
                Err(ProviderError::new(id, ProviderErrorKind::HttpStatus, "scripted 503"))
            }),
            Behaviour::Slow(delay) => Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok(full)
            }),
            Behaviour::Panicking => Box::pin(async move {
                let nothing: Vec<T> = Vec::new();
                Ok(nothing.into_iter().next().unwrap_or_else(|| panic!("{id} scripted panic")))
            }),
        }
    }
}

impl MarketDataSource for ScriptedSource {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    fn coins<'a>(&'a self, query: &'a CoinsQuery) -> SourceFuture<'a, Vec<CanonicalCoin>> {
        self.answer(coins_from(self.id, query.per_page), Vec::new())
    }

    fn global(&self) -> SourceFuture<'_, GlobalMarketSnapshot> {
        self.answer(
            GlobalMarketSnapshot::new(2.4e12, 9.1e10),
            GlobalMarketSnapshot::new(0.0, 0.0),
        )
    }

    fn trending(&self) -> SourceFuture<'_, TrendingList> {
        let coin = TrendingCoin {
            id: String::from("pepe"),
            symbol: String::from("pepe"),
            name: String::from("Pepe"),
            market_cap_rank: 30,
            score: 0,
            image_url: None,
        };
        self.answer(
            TrendingList { coins: vec![coin] },
            TrendingList { coins: Vec::new() },
        )
    }
}

/// `count` coins whose name records which provider produced them.
pub fn coins_from(provider: ProviderId, count: u32) -> Vec<CanonicalCoin> {
    (1..=count)
        .map(|rank| {
            CanonicalCoin::new(
                format!("coin-{rank}"),
                format!("c{rank}"),
                provider.as_str(),
                f64::from(rank),
            )
            .with_rank(Some(rank))
        })
        .collect()
}

/// Registry with priorities 1..=n in the given order, all enabled.
pub fn ranked_registry(ids: &[ProviderId]) -> SourceRegistry {
    SourceRegistry::new(
        ids.iter()
            .zip(1..)
            .map(|(id, priority)| {
                ProviderConfig::new(*id, "https://fixture.test", priority).expect("valid config")
            })
            .collect(),
    )
}

pub fn as_sources(sources: &[Arc<ScriptedSource>]) -> Vec<Arc<dyn MarketDataSource>> {
    sources
        .iter()
        .map(|source| source.clone() as Arc<dyn MarketDataSource>)
        .collect()
}
