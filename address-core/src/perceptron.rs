//! # Averaged Perceptron para Endereços
//!
//! Classificador linear multiclasse sobre features esparsas, decodificado de
//! forma **gulosa** da esquerda para a direita: cada palavra recebe o melhor
//! componente dado o que já foi decidido antes, sem revisão posterior.
//!
//! ## Treino
//!
//! O aprendizado é **online** e guiado por erros: para cada palavra, prediz
//! com os pesos correntes e, se errar, soma 1 ao peso do componente correto e
//! subtrai 1 do componente predito, para toda feature ativa. O rótulo que
//! alimenta as features seguintes é o **correto** (teacher forcing).
//!
//! ## Lazy Averaging
//!
//! O modelo final usa a média dos pesos ao longo de todos os passos. Somar
//! todos os pesos a cada passo custaria $O(N \cdot T)$; em vez disso cada
//! célula guarda o passo da última atualização e acumula
//! `(passo_atual - último_passo) * peso` só quando é tocada. O resultado é
//! idêntico à média ingênua.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::context::ParseContext;
use crate::features::address_features;
use crate::tagger::AddressComponent;

/// Um peso por componente, na ordem de enumeração.
pub type ClassWeights = [f64; AddressComponent::COUNT];

/// Modelo imutável: feature → pesos médios por componente.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AveragedPerceptron {
    weights: HashMap<String, ClassWeights>,
}

impl AveragedPerceptron {
    pub fn new(weights: HashMap<String, ClassWeights>) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &HashMap<String, ClassWeights> {
        &self.weights
    }

    pub fn get(&self, feature: &str) -> Option<&ClassWeights> {
        self.weights.get(feature)
    }

    /// Número de features com peso.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Soma dos pesos das features ativas, por componente. Features
    /// desconhecidas não contribuem.
    pub fn scores(&self, features: &[String]) -> ClassWeights {
        let mut scores = [0.0; AddressComponent::COUNT];
        for feature in features {
            if let Some(weights) = self.weights.get(feature) {
                for (score, w) in scores.iter_mut().zip(weights) {
                    *score += w;
                }
            }
        }
        scores
    }

    /// Componente de maior score; empates ficam com o primeiro na ordem de
    /// enumeração.
    pub fn predict(&self, features: &[String]) -> AddressComponent {
        argmax(&self.scores(features))
    }
}

fn argmax(scores: &ClassWeights) -> AddressComponent {
    let mut best = 0;
    for (i, score) in scores.iter().enumerate().skip(1) {
        if *score > scores[best] {
            best = i;
        }
    }
    AddressComponent::ALL[best]
}

/// Peso bruto + acumulador para a média preguiçosa.
#[derive(Debug, Clone, Copy, Default)]
struct WeightCell {
    value: f64,
    total: f64,
    last_update: u64,
}

impl WeightCell {
    fn update(&mut self, delta: f64, step: u64) {
        self.total += (step - self.last_update) as f64 * self.value;
        self.last_update = step;
        self.value += delta;
    }

    fn averaged(&self, steps: u64) -> f64 {
        if steps == 0 {
            return 0.0;
        }
        let total = self.total + (steps - self.last_update) as f64 * self.value;
        total / steps as f64
    }
}

/// Estado mutável do treino. Pertence exclusivamente à sessão de treino.
#[derive(Debug, Clone, Default)]
pub struct PerceptronTrainer {
    cells: HashMap<String, [WeightCell; AddressComponent::COUNT]>,
    steps: u64,
}

impl PerceptronTrainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Passos (palavras decodificadas) até agora.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Predição com os pesos **brutos** correntes.
    pub fn predict(&self, features: &[String]) -> AddressComponent {
        let mut scores = [0.0; AddressComponent::COUNT];
        for feature in features {
            if let Some(cells) = self.cells.get(feature) {
                for (score, cell) in scores.iter_mut().zip(cells) {
                    *score += cell.value;
                }
            }
        }
        argmax(&scores)
    }

    /// Promove `truth` e penaliza `guess` em todas as features ativas.
    /// Não faz nada se a predição estava certa.
    pub fn update(&mut self, features: &[String], truth: AddressComponent, guess: AddressComponent) {
        if truth == guess {
            return;
        }
        let step = self.steps;
        for feature in features {
            let cells = self.cells.entry(feature.clone()).or_default();
            cells[truth.index()].update(1.0, step);
            cells[guess.index()].update(-1.0, step);
        }
    }

    /// Avança o relógio: uma vez por palavra decodificada.
    pub fn tick(&mut self) {
        self.steps += 1;
    }

    /// Pesos médios até o passo atual, sem consumir o treinador.
    /// Features com todos os pesos médios nulos são descartadas.
    pub fn snapshot(&self) -> AveragedPerceptron {
        let mut weights = HashMap::with_capacity(self.cells.len());
        for (feature, cells) in &self.cells {
            let mut averaged = [0.0; AddressComponent::COUNT];
            for (w, cell) in averaged.iter_mut().zip(cells) {
                *w = cell.averaged(self.steps);
            }
            if averaged.iter().any(|w| *w != 0.0) {
                weights.insert(feature.clone(), averaged);
            }
        }
        AveragedPerceptron::new(weights)
    }

    pub fn finish(self) -> AveragedPerceptron {
        self.snapshot()
    }
}

/// Decodificação gulosa: um componente por palavra do contexto.
pub fn tag(model: &AveragedPerceptron, ctx: &mut ParseContext) -> Vec<AddressComponent> {
    let mut features = std::mem::take(&mut ctx.features);
    let mut labels = Vec::with_capacity(ctx.len());
    let (mut prev, mut prev2) = (None, None);

    for i in 0..ctx.len() {
        address_features(ctx, i, prev, prev2, &mut features);
        let label = model.predict(&features);
        labels.push(label);
        prev2 = prev;
        prev = Some(label);
    }

    ctx.features = features;
    labels
}

/// Treina sobre uma sequência rotulada. Devolve `(palavras, erros)`.
///
/// `gold` tem um componente por palavra do contexto.
pub fn train_sequence(
    trainer: &mut PerceptronTrainer,
    ctx: &mut ParseContext,
    gold: &[AddressComponent],
) -> (usize, usize) {
    let mut features = std::mem::take(&mut ctx.features);
    let (mut prev, mut prev2) = (None, None);
    let mut errors = 0;
    let n = ctx.len().min(gold.len());

    for (i, &truth) in gold.iter().enumerate().take(n) {
        address_features(ctx, i, prev, prev2, &mut features);
        let guess = trainer.predict(&features);
        if guess != truth {
            trainer.update(&features, truth, guess);
            errors += 1;
        }
        trainer.tick();
        prev2 = prev;
        prev = Some(truth);
    }

    ctx.features = features;
    (n, errors)
}
