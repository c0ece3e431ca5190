//! Ordered registry of engine adapters.

use std::sync::Arc;

use super::{Ahmia, TemplateEngine};
use crate::config::HarvestConfig;
use crate::engine::{EngineKind, EngineSpec};
use crate::Engine;

const DEFAULT_ENGINES: [(&str, &str, &str, EngineKind); 17] = [
    ("Ahmia", "ahmia", "http://juhanurmihxlp77nkq76byazcldy2hlmovfu2epvl5ankdibsot4csyd.onion/search/?q={query}", EngineKind::Ahmia),
    ("OnionLand", "onionland", "http://3bbad7fauom4d6sgppalyqddsqbf5u5p56b5k5uk2zxsy3d6ey2jobad.onion/search?q={query}", EngineKind::Template),
    ("Torgle", "torgle", "http://iy3544gmoeclh5de6gez2256v6pjh4omhpqdh2wpeeppjtvqmjhkfwad.onion/torgle/?query={query}", EngineKind::Template),
    ("Amnesia", "amnesia", "http://amnesia7u5odx5xbwtpnqk3edybgud5bmiagu75bnqx2crntw5kry7ad.onion/search?query={query}", EngineKind::Template),
    ("Kaizer", "kaizer", "http://kaizerwfvp5gxu6cppibp7jhcqptavq3iqef66wbxenh6a2fklibdvid.onion/search?q={query}", EngineKind::Template),
    ("Anima", "anima", "http://anima4ffe27xmakwnseih3ic2y7y3l6e7fucwk4oerdn4odf7k74tbid.onion/search?q={query}", EngineKind::Template),
    ("TorDex", "tordex", "http://2fd6cemt4gmccflhm6imvdfvli3nf7zn6rfrwpsy7uhxrgbypvwf5fad.onion/search?query={query}", EngineKind::Template),
    ("Oniway", "oniway", "http://oniwayzz74cv2puhsgx4dpjwieww4wdphsydqvf5q7eyz4myjvyw26ad.onion/search.php?s={query}", EngineKind::Template),
    ("Tor66", "tor66", "http://tor66sewebgixwhcqfnp5inzp5x5uohhdy3kvtnyfxc2e5mxiuh34iid.onion/search?q={query}", EngineKind::Template),
    ("OSS", "oss", "http://3fzh7yuupdfyjhwt3ugzqqof6ulbcl27ecev33knxe3u7goi3vfn2qqd.onion/oss/index.php?search={query}", EngineKind::Template),
    ("Torgol", "torgol", "http://torgolnpeouim56dykfob6jh5r2ps2j73enc42s2um4ufob3ny4fcdyd.onion/?q={query}", EngineKind::Template),
    ("SearchGF", "searchgf", "http://searchgf7gdtauh7bhnbyed4ivxqmuoat3nm6zfrg3ymkq6mtnpye3ad.onion/search?q={query}", EngineKind::Template),
    ("Tornado", "tornado", "http://tornadoxn3viscgz647shlysdy7ea5zqzwda7hierekeuokh5eh5b3qd.onion/search?q={query}", EngineKind::Template),
    ("TorNet", "tornet", "http://tornetupfu7gcgidt33ftnungxzyfq2pygui5qdoyss34xbgx2qruzid.onion/search?q={query}", EngineKind::Template),
    ("TorLanD", "torland", "http://torlbmqwtudkorme6prgfpmsnile7ug2zm4u3ejpcncxuhpu4k2j4kyd.onion/index.php?a=search&q={query}", EngineKind::Template),
    ("FindTor", "findtor", "http://findtorroveq5wdnipkaojfpqulxnkhblymc7aramjzajcvpptd4rjqd.onion/search?q={query}", EngineKind::Template),
    ("Leaks Index", "leaks", "http://leaksndi6i6m2ji6ozulqe4imlrqn6wrgjlhxe25vremvr3aymm4aaid.onion/", EngineKind::Template),
];

/// The built-in engine table, in registry order.
pub fn default_specs() -> Vec<EngineSpec> {
    DEFAULT_ENGINES
        .iter()
        .map(|(name, shortcut, template, kind)| {
            EngineSpec::new(*name, *shortcut, *template).with_kind(*kind)
        })
        .collect()
}

/// Builds the adapter for one registry row.
pub fn build_engine(spec: &EngineSpec, default_timeout: u64) -> Arc<dyn Engine> {
    match spec.kind {
        EngineKind::Template => Arc::new(TemplateEngine::from_spec(spec, default_timeout)),
        EngineKind::Ahmia => Arc::new(Ahmia::from_spec(spec, default_timeout)),
    }
}

/// Ordered list of engine adapters.
///
/// Order matters: when two engines report the same URL, the one registered
/// first is recorded as its source.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: Vec<Arc<dyn Engine>>,
}

impl EngineRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an engine.
    pub fn register(&mut self, engine: impl Engine + 'static) {
        self.engines.push(Arc::new(engine));
    }

    /// Appends a shared engine.
    pub fn register_arc(&mut self, engine: Arc<dyn Engine>) {
        self.engines.push(engine);
    }

    /// Builds a registry from the first `limit` rows of `specs`.
    pub fn from_specs(specs: &[EngineSpec], limit: usize, default_timeout: u64) -> Self {
        Self {
            engines: specs
                .iter()
                .take(limit)
                .map(|spec| build_engine(spec, default_timeout))
                .collect(),
        }
    }

    /// Builds the registry described by the configuration.
    ///
    /// An empty engine table selects the built-in one.
    pub fn from_config(config: &HarvestConfig) -> Self {
        let specs = if config.engines.is_empty() {
            default_specs()
        } else {
            config.engines.clone()
        };
        Self::from_specs(&specs, config.num_engines, config.search_timeout_secs)
    }

    /// Number of registered engines.
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    /// Returns whether no engine is registered.
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Iterates over all engines in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Engine>> {
        self.engines.iter()
    }

    /// Enabled engines in registry order.
    pub fn enabled(&self) -> Vec<Arc<dyn Engine>> {
        self.engines
            .iter()
            .filter(|e| e.is_enabled())
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.engines.iter().map(|e| e.shortcut()))
            .finish()
    }
}
