//! # Modelo Treinado e Persistência
//!
//! Um [`AddressParserModel`] reúne tudo que o treino produz: a tabela de pesos
//! do perceptron médio, o vocabulário e o dicionário de frases de componentes.
//! Depois de carregado é imutável e pode ser compartilhado entre threads.
//!
//! ## Layout do Diretório
//!
//! | Arquivo                        | Magic  | Conteúdo                    |
//! |--------------------------------|--------|-----------------------------|
//! | `address_parser.dat`           | `APWT` | pesos (feature → 10 pesos)  |
//! | `address_parser_vocab.trie`    | `APVT` | vocabulário                 |
//! | `address_parser_phrases.trie`  | `APPT` | frases de componentes       |
//!
//! Cada arquivo: magic de 4 bytes, versão `u32` little-endian, impressão
//! digital SHA-256 de 32 bytes e payload `bincode`. A impressão digital é
//! calculada sobre os três payloads e é a mesma nos três cabeçalhos: um
//! diretório com arquivos de gravações diferentes é rejeitado na carga.
//!
//! Os pesos são gravados ordenados por feature, então salvar o mesmo modelo
//! duas vezes produz arquivos idênticos byte a byte. A gravação escreve os
//! três temporários antes de renomear qualquer um deles.
//!
//! A carga valida tudo antes de devolver o modelo: nunca há modelo parcial.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::dictionary::{PhraseTypesTrie, Trie};
use crate::errors::{ParserError, Result};
use crate::perceptron::{AveragedPerceptron, ClassWeights};
use crate::tagger::AddressComponent;

pub const WEIGHTS_FILE: &str = "address_parser.dat";
pub const VOCAB_FILE: &str = "address_parser_vocab.trie";
pub const PHRASES_FILE: &str = "address_parser_phrases.trie";

pub const FORMAT_VERSION: u32 = 2;

const WEIGHTS_MAGIC: &[u8; 4] = b"APWT";
const VOCAB_MAGIC: &[u8; 4] = b"APVT";
const PHRASES_MAGIC: &[u8; 4] = b"APPT";

type Fingerprint = [u8; 32];

const HEADER_LEN: usize = 8 + 32;

/// Arquivos do diretório, na ordem em que entram na impressão digital.
const FILES: [(&str, &[u8; 4]); 3] = [
    (WEIGHTS_FILE, WEIGHTS_MAGIC),
    (VOCAB_FILE, VOCAB_MAGIC),
    (PHRASES_FILE, PHRASES_MAGIC),
];

/// Modelo completo do parser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressParserModel {
    perceptron: AveragedPerceptron,
    vocab: Trie,
    phrase_types: PhraseTypesTrie,
}

/// Forma gravada da tabela de pesos: classes explícitas e features ordenadas.
#[derive(Serialize, Deserialize)]
struct StoredWeights {
    classes: Vec<String>,
    features: Vec<(String, ClassWeights)>,
}

impl StoredWeights {
    fn from_model(model: &AveragedPerceptron) -> Self {
        let mut features: Vec<(String, ClassWeights)> = model
            .weights()
            .iter()
            .map(|(feature, weights)| (feature.clone(), *weights))
            .collect();
        features.sort_by(|a, b| a.0.cmp(&b.0));
        Self {
            classes: AddressComponent::ALL.iter().map(|c| c.name().to_string()).collect(),
            features,
        }
    }

    fn into_model(self, path: &Path) -> Result<AveragedPerceptron> {
        let expected: Vec<&str> = AddressComponent::ALL.iter().map(|c| c.name()).collect();
        if self.classes != expected {
            return Err(ParserError::corrupt(
                path,
                format!("classes inesperadas: {:?}", self.classes),
            ));
        }

        let mut weights = std::collections::HashMap::with_capacity(self.features.len());
        for (feature, row) in self.features {
            if row.iter().any(|w| !w.is_finite()) {
                return Err(ParserError::corrupt(path, format!("peso não finito em '{feature}'")));
            }
            if weights.insert(feature.clone(), row).is_some() {
                return Err(ParserError::corrupt(path, format!("feature repetida: '{feature}'")));
            }
        }
        Ok(AveragedPerceptron::new(weights))
    }
}

impl AddressParserModel {
    pub fn new(perceptron: AveragedPerceptron, vocab: Trie, phrase_types: PhraseTypesTrie) -> Self {
        Self {
            perceptron,
            vocab,
            phrase_types,
        }
    }

    pub fn perceptron(&self) -> &AveragedPerceptron {
        &self.perceptron
    }

    pub fn vocab(&self) -> &Trie {
        &self.vocab
    }

    pub fn phrase_types(&self) -> &PhraseTypesTrie {
        &self.phrase_types
    }

    /// Grava os três arquivos em `dir` (criado se não existir).
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        let payloads = [
            encode(&dir.join(WEIGHTS_FILE), &StoredWeights::from_model(&self.perceptron))?,
            encode(&dir.join(VOCAB_FILE), &self.vocab)?,
            encode(&dir.join(PHRASES_FILE), &self.phrase_types)?,
        ];
        write_payloads(dir, &payloads)?;

        info!(
            dir = %dir.display(),
            features = self.perceptron.len(),
            vocab = self.vocab.len(),
            phrases = self.phrase_types.len(),
            "modelo gravado"
        );
        Ok(())
    }

    /// Carrega e valida o modelo gravado em `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();

        for (name, _) in FILES {
            let path = dir.join(name);
            if !path.is_file() {
                return Err(ParserError::MissingFile(path));
            }
        }

        let [weights, vocab, phrases] = FILES.map(|(name, magic)| read_payload(dir, name, magic));
        let files = [weights?, vocab?, phrases?];

        let expected = fingerprint(files.iter().map(|(_, payload)| payload.as_slice()));
        for ((name, _), (found, _)) in FILES.iter().zip(&files) {
            if *found != expected {
                return Err(ParserError::corrupt(
                    dir.join(name),
                    "impressão digital não confere com o restante do diretório",
                ));
            }
        }
        let [(_, weights), (_, vocab), (_, phrases)] = files;

        let weights_path = dir.join(WEIGHTS_FILE);
        let stored: StoredWeights = decode(&weights_path, &weights)?;
        let perceptron = stored.into_model(&weights_path)?;
        let vocab: Trie = decode(&dir.join(VOCAB_FILE), &vocab)?;
        let phrases_path = dir.join(PHRASES_FILE);
        let phrase_types: PhraseTypesTrie = decode(&phrases_path, &phrases)?;
        phrase_types
            .validate()
            .map_err(|reason| ParserError::corrupt(&phrases_path, reason))?;

        info!(
            dir = %dir.display(),
            features = perceptron.len(),
            vocab = vocab.len(),
            phrases = phrase_types.len(),
            "modelo carregado"
        );
        Ok(Self::new(perceptron, vocab, phrase_types))
    }
}

fn bincode_options(limit: usize) -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(limit as u64)
        .reject_trailing_bytes()
}

fn encode<T: Serialize>(path: &Path, payload: &T) -> Result<Vec<u8>> {
    bincode::serialize(payload).map_err(|e| ParserError::corrupt(path, e.to_string()))
}

/// Decodifica a partir da fatia: comprimentos gravados nunca reservam mais
/// memória do que os bytes disponíveis.
fn decode<T: DeserializeOwned>(path: &Path, payload: &[u8]) -> Result<T> {
    bincode_options(payload.len())
        .deserialize(payload)
        .map_err(|e| ParserError::corrupt(path, e.to_string()))
}

fn fingerprint<'a>(payloads: impl IntoIterator<Item = &'a [u8]>) -> Fingerprint {
    let mut hasher = Sha256::new();
    for payload in payloads {
        hasher.update((payload.len() as u64).to_le_bytes());
        hasher.update(payload);
    }
    let mut print = [0u8; 32];
    print.copy_from_slice(&hasher.finalize());
    print
}

/// Escreve os três temporários e só então renomeia. Em caso de falha os
/// temporários já escritos são removidos.
fn write_payloads(dir: &Path, payloads: &[Vec<u8>; 3]) -> Result<()> {
    fs::create_dir_all(dir)?;
    let print = fingerprint(payloads.iter().map(Vec::as_slice));

    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(FILES.len());
    for ((name, magic), payload) in FILES.iter().zip(payloads) {
        let path = dir.join(name);
        let tmp = dir.join(format!("{name}.tmp"));

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(*magic);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&print);
        bytes.extend_from_slice(payload);

        if let Err(e) = fs::write(&tmp, &bytes) {
            staged.push((tmp, path));
            discard(&staged);
            return Err(e.into());
        }
        staged.push((tmp, path));
    }

    for (i, (tmp, path)) in staged.iter().enumerate() {
        if let Err(e) = fs::rename(tmp, path) {
            discard(&staged[i..]);
            return Err(e.into());
        }
    }
    Ok(())
}

fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (tmp, _) in staged {
        if let Err(e) = fs::remove_file(tmp) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %tmp.display(), error = %e, "temporário não removido");
            }
        }
    }
}

/// Lê um arquivo e confere magic e versão. Devolve a impressão digital do
/// cabeçalho e o payload ainda não decodificado.
fn read_payload(dir: &Path, name: &str, magic: &[u8; 4]) -> Result<(Fingerprint, Vec<u8>)> {
    let path = dir.join(name);
    let mut bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(ParserError::MissingFile(path)),
        Err(e) => return Err(e.into()),
    };

    if bytes.len() < HEADER_LEN {
        return Err(ParserError::corrupt(&path, "cabeçalho truncado"));
    }
    if &bytes[..4] != magic {
        return Err(ParserError::corrupt(&path, "magic inválido"));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[4..8]);
    let version = u32::from_le_bytes(version);
    if version != FORMAT_VERSION {
        return Err(ParserError::corrupt(
            &path,
            format!("versão {version} não suportada (esperada {FORMAT_VERSION})"),
        ));
    }

    let mut print = [0u8; 32];
    print.copy_from_slice(&bytes[8..HEADER_LEN]);
    let payload = bytes.split_off(HEADER_LEN);
    Ok((print, payload))
}
