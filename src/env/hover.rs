//! `Hover`: a small synthetic multi-drone task.
//!
//! Every drone is a point mass driven by four rotor throttles in `[-1, 1]`
//! (rotor 0 front, 1 right, 2 back, 3 left). Collective throttle accelerates
//! vertically with gravity already compensated at zero throttle; opposing
//! rotor differences tilt the body and accelerate it laterally. The goal is
//! to hold every drone at a fixed target point.
//!
//! The task exists so that the training loop can run end to end without an
//! external simulator; it is deliberately cheap and deterministic per seed.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::nested::{LeafSpec, Nested, Observation, Spec};
use super::spec::{ActionSpec, AgentSpec};
use super::traits::{Environment, Frame, StepOutput, AGENT_GROUP};

const TARGET: [f32; 3] = [0.0, 0.0, 1.0];
const VERTICAL_GAIN: f32 = 5.0;
const LATERAL_GAIN: f32 = 4.0;
const DRAG: f32 = 0.5;
/// A drone further than this from the target has crashed.
const CRASH_RADIUS: f32 = 2.5;
const ROTORS: usize = 4;
const RENDER_SIZE: usize = 32;

/// Batched hover task with `num_drones` drones per environment.
#[derive(Debug, Clone)]
pub struct HoverEnv {
    num_envs: usize,
    num_drones: usize,
    max_episode_length: usize,
    /// Physics step in seconds.
    dt: f32,
    substeps: u32,
    rng: StdRng,
    /// Indexed by `env * num_drones + drone`.
    pos: Vec<[f32; 3]>,
    vel: Vec<[f32; 3]>,
    episode_return: Vec<f32>,
    episode_len: Vec<usize>,
    training: bool,
    render: bool,
    observation_spec: Spec,
}

impl HoverEnv {
    pub fn new(
        num_envs: usize,
        num_drones: usize,
        max_episode_length: usize,
        dt: f64,
        substeps: u32,
    ) -> Self {
        let slots = num_envs * num_drones;
        Self {
            num_envs,
            num_drones,
            max_episode_length,
            dt: dt as f32,
            substeps: substeps.max(1),
            rng: StdRng::seed_from_u64(0),
            pos: vec![TARGET; slots],
            vel: vec![[0.0; 3]; slots],
            episode_return: vec![0.0; num_envs],
            episode_len: vec![0; num_envs],
            training: true,
            render: false,
            observation_spec: Self::build_spec(num_drones),
        }
    }

    fn build_spec(n: usize) -> Spec {
        let per_agent = |width| Nested::Leaf(LeafSpec::unbounded(vec![n, width]));
        Nested::node()
            .with(
                "agents",
                Nested::node()
                    .with(
                        "observation",
                        Nested::node()
                            .with("rpos", per_agent(3))
                            .with("vel", per_agent(3)),
                    )
                    .with(
                        "observation_central",
                        Nested::node().with("state", per_agent(6 * n)),
                    ),
            )
            .with(
                "stats",
                Nested::node()
                    .with("return", Nested::Leaf(LeafSpec::unbounded(vec![1])))
                    .with("episode_len", Nested::Leaf(LeafSpec::unbounded(vec![1]))),
            )
    }

    fn slots(&self, env: usize) -> std::ops::Range<usize> {
        env * self.num_drones..(env + 1) * self.num_drones
    }

    fn reset_env(&mut self, env: usize) {
        for slot in self.slots(env) {
            let mut p = TARGET;
            for x in p.iter_mut() {
                *x += self.rng.gen_range(-0.5..0.5);
            }
            self.pos[slot] = p;
            self.vel[slot] = [0.0; 3];
        }
        self.episode_return[env] = 0.0;
        self.episode_len[env] = 0;
    }

    fn distance(&self, slot: usize) -> f32 {
        let p = self.pos[slot];
        ((p[0] - TARGET[0]).powi(2) + (p[1] - TARGET[1]).powi(2) + (p[2] - TARGET[2]).powi(2))
            .sqrt()
    }

    fn observe(&self, env: usize) -> Observation {
        let mut rpos = Vec::with_capacity(self.num_drones * 3);
        let mut vel = Vec::with_capacity(self.num_drones * 3);
        let mut joint = Vec::with_capacity(self.num_drones * 6);
        for slot in self.slots(env) {
            let p = self.pos[slot];
            let v = self.vel[slot];
            rpos.extend((0..3).map(|i| TARGET[i] - p[i]));
            vel.extend_from_slice(&v);
            joint.extend_from_slice(&p);
            joint.extend_from_slice(&v);
        }
        let central: Vec<f32> = (0..self.num_drones).flat_map(|_| joint.clone()).collect();

        Nested::node()
            .with(
                "agents",
                Nested::node()
                    .with(
                        "observation",
                        Nested::node()
                            .with("rpos", Nested::Leaf(rpos))
                            .with("vel", Nested::Leaf(vel)),
                    )
                    .with(
                        "observation_central",
                        Nested::node().with("state", Nested::Leaf(central)),
                    ),
            )
            .with(
                "stats",
                Nested::node()
                    .with("return", Nested::Leaf(vec![self.episode_return[env]]))
                    .with(
                        "episode_len",
                        Nested::Leaf(vec![self.episode_len[env] as f32]),
                    ),
            )
    }

    fn integrate(&mut self, slot: usize, throttle: &[f32]) {
        let a: Vec<f32> = throttle.iter().map(|x| x.clamp(-1.0, 1.0)).collect();
        let collective = a.iter().sum::<f32>() / ROTORS as f32;
        let dt = self.dt;
        for _ in 0..self.substeps {
            let v = self.vel[slot];
            let acc = [
                LATERAL_GAIN * (a[3] - a[1]) / 2.0 - DRAG * v[0],
                LATERAL_GAIN * (a[2] - a[0]) / 2.0 - DRAG * v[1],
                VERTICAL_GAIN * collective - DRAG * v[2],
            ];
            for i in 0..3 {
                self.vel[slot][i] += acc[i] * dt;
                self.pos[slot][i] += self.vel[slot][i] * dt;
            }
        }
    }
}

impl Environment for HoverEnv {
    fn num_envs(&self) -> usize {
        self.num_envs
    }

    fn max_episode_length(&self) -> usize {
        self.max_episode_length
    }

    fn observation_spec(&self) -> &Spec {
        &self.observation_spec
    }

    fn agent_spec(&self, group: &str) -> Option<AgentSpec> {
        if group != AGENT_GROUP {
            return None;
        }
        Some(AgentSpec {
            name: AGENT_GROUP.into(),
            n: self.num_drones,
            observation: self.observation_spec.get("agents.observation")?.clone(),
            observation_central: self
                .observation_spec
                .get("agents.observation_central")
                .cloned(),
            action: ActionSpec::Continuous {
                dim: ROTORS,
                low: -1.0,
                high: 1.0,
            },
        })
    }

    fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn reset(&mut self) -> Result<Vec<Observation>> {
        for env in 0..self.num_envs {
            self.reset_env(env);
        }
        Ok((0..self.num_envs).map(|env| self.observe(env)).collect())
    }

    fn reset_where(&mut self, mask: &[bool]) -> Result<Vec<Observation>> {
        if mask.len() != self.num_envs {
            bail!(
                "reset mask has {} entries, expected {}",
                mask.len(),
                self.num_envs
            );
        }
        for (env, &reset) in mask.iter().enumerate() {
            if reset {
                self.reset_env(env);
            }
        }
        Ok((0..self.num_envs).map(|env| self.observe(env)).collect())
    }

    fn step(&mut self, actions: &[Vec<f32>]) -> Result<StepOutput> {
        if actions.len() != self.num_envs {
            bail!(
                "got actions for {} environments, expected {}",
                actions.len(),
                self.num_envs
            );
        }
        let width = self.num_drones * ROTORS;
        let mut rewards = Vec::with_capacity(self.num_envs);
        let mut dones = Vec::with_capacity(self.num_envs);

        for (env, action) in actions.iter().enumerate() {
            if action.len() != width {
                bail!(
                    "environment {env}: expected {width} action values, got {}",
                    action.len()
                );
            }
            let mut reward = 0.0;
            let mut crashed = false;
            for (drone, slot) in self.slots(env).enumerate() {
                self.integrate(slot, &action[drone * ROTORS..(drone + 1) * ROTORS]);
                let dist = self.distance(slot);
                reward += 1.0 / (1.0 + dist);
                crashed |= dist > CRASH_RADIUS || self.pos[slot][2] < 0.0;
            }
            let reward = reward / self.num_drones as f32;

            self.episode_return[env] += reward;
            self.episode_len[env] += 1;
            rewards.push(reward);
            dones.push(crashed || self.episode_len[env] >= self.max_episode_length);
        }

        let observations = (0..self.num_envs).map(|env| self.observe(env)).collect();
        Ok(StepOutput {
            observations,
            rewards,
            dones,
        })
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn enable_render(&mut self, enabled: bool) {
        self.render = enabled;
    }

    fn render_enabled(&self) -> bool {
        self.render
    }

    /// Top-down view of environment 0: target in green, drones in white with
    /// brightness following altitude.
    fn render(&mut self) -> Option<Frame> {
        if !self.render || self.num_envs == 0 {
            return None;
        }
        let size = RENDER_SIZE;
        let mut data = vec![16u8; size * size * 3];
        let to_pixel = |x: f32| {
            let unit = (x + CRASH_RADIUS) / (2.0 * CRASH_RADIUS);
            ((unit * (size - 1) as f32).round() as isize).clamp(0, size as isize - 1) as usize
        };
        let mut paint = |x: f32, y: f32, rgb: [u8; 3]| {
            let offset = (to_pixel(y) * size + to_pixel(x)) * 3;
            data[offset..offset + 3].copy_from_slice(&rgb);
        };

        paint(TARGET[0], TARGET[1], [0, 200, 0]);
        for slot in self.slots(0) {
            let p = self.pos[slot];
            let shade = (128.0 + 127.0 * (p[2] / (2.0 * TARGET[2])).clamp(0.0, 1.0)) as u8;
            paint(p[0], p[1], [shade, shade, shade]);
        }

        Some(Frame {
            height: size,
            width: size,
            channels: 3,
            data,
        })
    }
}
