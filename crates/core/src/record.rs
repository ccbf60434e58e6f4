//! Person record extracted from the documents.
//!
//! The JSON wire keys (`nome_do_menor`, `endereço`, …) are shared by the AI prompt and the
//! saved-record file, so they stay in Portuguese. The wire model is strict: unknown keys
//! are rejected (model answers drop them first, see
//! [`PersonRecord::parse_json_ignoring_unknown`]), every scalar is a string or `null`,
//! and `cids` is a list of strings.
//! Blank strings are treated as absent so the form fallbacks apply.

use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Data gathered about a beneficiary and their guardian.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonRecord {
    pub guardian_name: Option<String>,
    pub beneficiary_name: Option<String>,
    pub mother_name: Option<String>,
    pub guardian_cpf: Option<String>,
    pub guardian_rg: Option<String>,
    pub beneficiary_cpf: Option<String>,
    pub beneficiary_rg: Option<String>,
    /// Birth date as `DD/MM/YYYY` text.
    pub birth_date: Option<String>,
    /// `"<street>, <number>"`.
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub city: Option<String>,
    /// Free-text diagnosis codes; `None` when the key was absent.
    pub cids: Option<Vec<String>>,
}

/// Scalar keys of a [`PersonRecord`], used by form field specs to name their source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    GuardianName,
    BeneficiaryName,
    MotherName,
    GuardianCpf,
    GuardianRg,
    BeneficiaryCpf,
    BeneficiaryRg,
    BirthDate,
    Address,
    PostalCode,
    Phone,
    Email,
    City,
}

impl RecordField {
    pub const ALL: [RecordField; 13] = [
        RecordField::GuardianName,
        RecordField::BeneficiaryName,
        RecordField::MotherName,
        RecordField::GuardianCpf,
        RecordField::GuardianRg,
        RecordField::BeneficiaryCpf,
        RecordField::BeneficiaryRg,
        RecordField::BirthDate,
        RecordField::Address,
        RecordField::PostalCode,
        RecordField::Phone,
        RecordField::Email,
        RecordField::City,
    ];

    /// Wire key of the field.
    pub fn key(self) -> &'static str {
        match self {
            RecordField::GuardianName => "nome_do_responsavel",
            RecordField::BeneficiaryName => "nome_do_menor",
            RecordField::MotherName => "nome_da_mae_do_menor",
            RecordField::GuardianCpf => "cpf_do_responsavel",
            RecordField::GuardianRg => "rg_do_responsavel",
            RecordField::BeneficiaryCpf => "cpf_do_menor",
            RecordField::BeneficiaryRg => "rg_do_menor",
            RecordField::BirthDate => "data_de_nascimento_do_menor",
            RecordField::Address => "endereço",
            RecordField::PostalCode => "cep",
            RecordField::Phone => "telefone",
            RecordField::Email => "email",
            RecordField::City => "cidade",
        }
    }
}

impl PersonRecord {
    /// Record holding only the beneficiary's name, for manual completion.
    pub fn skeleton(beneficiary_name: &str) -> Self {
        Self {
            beneficiary_name: non_blank(Some(beneficiary_name.to_owned())),
            ..Self::default()
        }
    }

    /// Value of a scalar field, or `None` when absent.
    pub fn get(&self, field: RecordField) -> Option<&str> {
        let value = match field {
            RecordField::GuardianName => &self.guardian_name,
            RecordField::BeneficiaryName => &self.beneficiary_name,
            RecordField::MotherName => &self.mother_name,
            RecordField::GuardianCpf => &self.guardian_cpf,
            RecordField::GuardianRg => &self.guardian_rg,
            RecordField::BeneficiaryCpf => &self.beneficiary_cpf,
            RecordField::BeneficiaryRg => &self.beneficiary_rg,
            RecordField::BirthDate => &self.birth_date,
            RecordField::Address => &self.address,
            RecordField::PostalCode => &self.postal_code,
            RecordField::Phone => &self.phone,
            RecordField::Email => &self.email,
            RecordField::City => &self.city,
        };
        value.as_deref()
    }

    /// Parse a record from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::RecordSchema` naming the failing path (e.g. `cids[1]`) when the
    /// text does not match the wire schema.
    pub fn parse_json(json_text: &str) -> CoreResult<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(json_text);

        let wire = match serde_path_to_error::deserialize::<_, PersonRecordWire>(&mut deserializer)
        {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() || path == "." {
                    "<root>".to_owned()
                } else {
                    path
                };
                return Err(CoreError::RecordSchema {
                    path,
                    message: source.to_string(),
                });
            }
        };
        deserializer.end()?;

        Ok(wire.into())
    }

    /// Parse a record from a JSON object, dropping keys the schema does not know.
    ///
    /// Used for model answers, which may add commentary keys. Known keys are still
    /// checked as strictly as in [`parse_json`](Self::parse_json). Returns the record and
    /// the names of the dropped keys.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::RecordSchema` when the text is not a JSON object or a known
    /// key has the wrong type.
    pub fn parse_json_ignoring_unknown(json_text: &str) -> CoreResult<(Self, Vec<String>)> {
        let mut object = match serde_json::from_str::<serde_json::Value>(json_text) {
            Ok(serde_json::Value::Object(object)) => object,
            Ok(_) => {
                return Err(CoreError::RecordSchema {
                    path: "<root>".into(),
                    message: "expected a JSON object".into(),
                })
            }
            Err(e) => {
                return Err(CoreError::RecordSchema {
                    path: "<root>".into(),
                    message: e.to_string(),
                })
            }
        };

        let ignored: Vec<String> = object
            .keys()
            .filter(|key| !is_wire_key(key))
            .cloned()
            .collect();
        for key in &ignored {
            object.remove(key);
        }

        let record = Self::parse_json(&serde_json::Value::Object(object).to_string())?;
        Ok((record, ignored))
    }

    /// Render the record as pretty-printed JSON, omitting absent keys.
    pub fn render_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(&PersonRecordWire::from(self))?)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct PersonRecordWire {
    #[serde(rename = "nome_do_responsavel", skip_serializing_if = "Option::is_none")]
    guardian_name: Option<String>,
    #[serde(rename = "nome_do_menor", skip_serializing_if = "Option::is_none")]
    beneficiary_name: Option<String>,
    #[serde(rename = "nome_da_mae_do_menor", skip_serializing_if = "Option::is_none")]
    mother_name: Option<String>,
    #[serde(rename = "cpf_do_responsavel", skip_serializing_if = "Option::is_none")]
    guardian_cpf: Option<String>,
    #[serde(rename = "rg_do_responsavel", skip_serializing_if = "Option::is_none")]
    guardian_rg: Option<String>,
    #[serde(rename = "cpf_do_menor", skip_serializing_if = "Option::is_none")]
    beneficiary_cpf: Option<String>,
    #[serde(rename = "rg_do_menor", skip_serializing_if = "Option::is_none")]
    beneficiary_rg: Option<String>,
    #[serde(
        rename = "data_de_nascimento_do_menor",
        skip_serializing_if = "Option::is_none"
    )]
    birth_date: Option<String>,
    #[serde(
        rename = "endereço",
        alias = "endereco",
        skip_serializing_if = "Option::is_none"
    )]
    address: Option<String>,
    #[serde(rename = "cep", skip_serializing_if = "Option::is_none")]
    postal_code: Option<String>,
    #[serde(rename = "telefone", skip_serializing_if = "Option::is_none")]
    phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(rename = "cidade", skip_serializing_if = "Option::is_none")]
    city: Option<String>,
    #[serde(alias = "cid", skip_serializing_if = "Option::is_none")]
    cids: Option<Vec<String>>,
}

fn is_wire_key(key: &str) -> bool {
    RecordField::ALL.iter().any(|field| field.key() == key)
        || matches!(key, "endereco" | "cids" | "cid")
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl From<PersonRecordWire> for PersonRecord {
    fn from(wire: PersonRecordWire) -> Self {
        Self {
            guardian_name: non_blank(wire.guardian_name),
            beneficiary_name: non_blank(wire.beneficiary_name),
            mother_name: non_blank(wire.mother_name),
            guardian_cpf: non_blank(wire.guardian_cpf),
            guardian_rg: non_blank(wire.guardian_rg),
            beneficiary_cpf: non_blank(wire.beneficiary_cpf),
            beneficiary_rg: non_blank(wire.beneficiary_rg),
            birth_date: non_blank(wire.birth_date),
            address: non_blank(wire.address),
            postal_code: non_blank(wire.postal_code),
            phone: non_blank(wire.phone),
            email: non_blank(wire.email),
            city: non_blank(wire.city),
            cids: wire.cids.map(|codes| {
                codes
                    .into_iter()
                    .map(|c| c.trim().to_owned())
                    .filter(|c| !c.is_empty())
                    .collect()
            }),
        }
    }
}

impl From<&PersonRecord> for PersonRecordWire {
    fn from(record: &PersonRecord) -> Self {
        Self {
            guardian_name: record.guardian_name.clone(),
            beneficiary_name: record.beneficiary_name.clone(),
            mother_name: record.mother_name.clone(),
            guardian_cpf: record.guardian_cpf.clone(),
            guardian_rg: record.guardian_rg.clone(),
            beneficiary_cpf: record.beneficiary_cpf.clone(),
            beneficiary_rg: record.beneficiary_rg.clone(),
            birth_date: record.birth_date.clone(),
            address: record.address.clone(),
            postal_code: record.postal_code.clone(),
            phone: record.phone.clone(),
            email: record.email.clone(),
            city: record.city.clone(),
            cids: record.cids.clone(),
        }
    }
}
